//! Fixed teacher persona, canned classroom prompts and student-facing fallbacks.

use crate::domain::{Chapter, Subject};

/// System framing sent ahead of every classroom question
pub const TEACHER_PERSONA: &str = "You are a friendly, encouraging, but strict Grade 12 (G12) tuition teacher in Myanmar.
Your goal is to help students, especially \"weak\" students, excel in their exams.
Rules:
1. Always teach in Myanmar language (Unicode).
2. Use short, simple sentences. Use light emojis.
3. If asked about a memorization subject (Myanmar, History, Geography, Economics), provide a Summary, Easy Memorization (bullets/tables), or Exam Prediction.
4. For Math, show step-by-step solutions and highlight common mistakes.
5. For English, use practical examples, grammar exercises, and sentence structure building.
6. Strictly teach ONLY from the context of the lesson images provided by the student.
7. Be encouraging: \"Even if you are weak, we will make you strong.\"
8. Accountability: if a lesson was missed or rescheduled, apologize and allocate extra time.";

/// Sent automatically after the first image batch of a chapter
pub const OPENING_PROMPT: &str = "မင်္ဂလာပါ။ ဒီသင်ခန်းစာကို စတင်သင်ကြားပေးပါဦး ဆရာ။";

/// Shown in place of a reply when the gateway fails
pub const APOLOGY_REPLY: &str =
    "ဆောရီးပါ။ အင်တာနက်အနည်းငယ် အခက်အခဲရှိနေလို့ ပြန်ကြိုးစားပေးပါဦး။";

/// Used when the model answers with no text at all
pub const NO_ANSWER_REPLY: &str = "Sorry, I couldn't process that.";

/// One-tap instructional prompts offered under the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChip {
    Summarize,
    MemoryTips,
    ExamPrediction,
    SimpleExamples,
}

impl PromptChip {
    pub const ALL: [PromptChip; 4] = [
        Self::Summarize,
        Self::MemoryTips,
        Self::ExamPrediction,
        Self::SimpleExamples,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::MemoryTips => "memory-tips",
            Self::ExamPrediction => "exam-prediction",
            Self::SimpleExamples => "simple-examples",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|chip| chip.as_str() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Summarize => "📌 အကျဉ်းချုပ်ပေးပါ",
            Self::MemoryTips => "💡 ကျက်ရလွယ်တဲ့နည်း",
            Self::ExamPrediction => "📝 စာမေးပွဲ ခန့်မှန်းချက်",
            Self::SimpleExamples => "🍎 ဥပမာအလွယ်ပေးပါ",
        }
    }

    /// The message actually sent to the teacher
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Summarize => "ဒီသင်ခန်းစာကို အချက် (၅) ချက်နဲ့ အကျဉ်းချုပ်ပေးပါ။",
            Self::MemoryTips => "ကျက်ရလွယ်အောင် Bullet points လေးတွေနဲ့ ပြောပြပေးပါ။",
            Self::ExamPrediction => "ဒီအခန်းက စာမေးပွဲမှာ ဘယ်လိုမေးလေ့ရှိလဲ?",
            Self::SimpleExamples => "ဥပမာအလွယ်ဆုံးတွေနဲ့ ရှင်းပြပေးပါခင်ဗျာ။",
        }
    }
}

/// Context line describing what the teacher is looking at
pub fn classroom_context(subject: &Subject, chapter: &Chapter) -> String {
    format!(
        "Teaching {} - {}. Images uploaded: {}",
        subject.name,
        chapter.title,
        chapter.image_count()
    )
}

/// Full text part for a classroom turn
pub fn conversation_text(prompt: &str, context: &str) -> String {
    format!("{}\nContext: {}\n\nQuestion: {}", TEACHER_PERSONA, context, prompt)
}

/// Instruction for exam generation
pub fn exam_instruction(subject_name: &str, chapter_title: &str) -> String {
    format!(
        "Based on the attached lesson images for G12 {} - {}, generate a strict exam with 5 multiple choice questions and 2 short answer questions. Output in JSON format.",
        subject_name, chapter_title
    )
}
