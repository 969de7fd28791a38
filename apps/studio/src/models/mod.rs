pub mod resume;

pub use resume::{
    AwardEntry, EducationEntry, ExperienceEntry, FormatOptions, Margins, ProjectEntry,
    ResumeSnapshot, SectionKind, SkillGroup, Website,
};
