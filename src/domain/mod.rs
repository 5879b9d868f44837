pub mod exam;
pub mod image;
pub mod message;
pub mod subject;
pub mod timetable;

pub use exam::{ExamDocument, Question, QuestionId};
pub use image::{EncodedImage, ImageMime, RawUpload};
pub use message::{Message, Role};
pub use subject::{Chapter, Subject, SubjectId};
pub use timetable::{ClockTime, Timetable, TimetableEntry, TimetableState};
