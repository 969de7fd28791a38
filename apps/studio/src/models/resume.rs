use serde::{Deserialize, Serialize};

/// Full form contents at one instant. This is the unit the preview pipeline
/// fingerprints and compiles; it carries everything that affects rendered
/// output, including section ordering and formatting controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub websites: Vec<Website>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub skills: Vec<SkillGroup>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default)]
    pub awards: Vec<AwardEntry>,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub formatting: FormatOptions,
    /// Render order of the content sections. Reordering changes the
    /// fingerprint even when every field is untouched.
    #[serde(default = "SectionKind::default_order")]
    pub section_order: Vec<SectionKind>,
}

impl Default for ResumeSnapshot {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            websites: Vec::new(),
            experience: Vec::new(),
            education: Vec::new(),
            skills: Vec::new(),
            projects: Vec::new(),
            awards: Vec::new(),
            template: default_template(),
            formatting: FormatOptions::default(),
            section_order: SectionKind::default_order(),
        }
    }
}

fn default_template() -> String {
    "classic".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Education,
    Work,
    Skills,
    Projects,
    Awards,
}

impl SectionKind {
    pub fn default_order() -> Vec<SectionKind> {
        vec![
            SectionKind::Education,
            SectionKind::Work,
            SectionKind::Skills,
            SectionKind::Projects,
            SectionKind::Awards,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Website {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub graduation_date: String,
    #[serde(default)]
    pub gpa: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGroup {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub url_label: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub awarder: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Formatting controls from the styling tab. Values stay as the free-form
/// strings the form emits ("11pt", "1.15"); the render side interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOptions {
    #[serde(default)]
    pub font_family: String,
    #[serde(default)]
    pub base_font_size: String,
    #[serde(default)]
    pub line_spacing: String,
    #[serde(default)]
    pub section_spacing: String,
    #[serde(default)]
    pub bullet_style: String,
    #[serde(default)]
    pub color_theme: String,
    #[serde(default)]
    pub margins: Margins,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            font_family: "times".to_string(),
            base_font_size: "11pt".to_string(),
            line_spacing: "1.0".to_string(),
            section_spacing: "normal".to_string(),
            bullet_style: "bullet".to_string(),
            color_theme: "black".to_string(),
            margins: Margins::default(),
        }
    }
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 20.0,
            bottom: 20.0,
            left: 20.0,
            right: 20.0,
        }
    }
}
