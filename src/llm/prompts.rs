use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = "You write cover letters tailored to a specific job.
Rules:
- Never invent experience, employers, degrees or metrics that the resume text does not support.
- Use only facts from the resume text and the user's inputs.
- Be concise, confident and specific.
- No buzzword padding or generic filler.
- Reply with the cover letter text only: no markdown, no commentary.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Friendly,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
        }
    }

    fn guide(self) -> &'static str {
        match self {
            Tone::Professional => "Professional, formal, and polished.",
            Tone::Friendly => "Warm, friendly, and approachable (still professional).",
        }
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "professional" => Ok(Tone::Professional),
            "friendly" => Ok(Tone::Friendly),
            other => Err(format!("unknown tone '{other}'")),
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the model sees for one draft.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub input_full_name: String,
    pub job_title: String,
    pub company_name: String,
    pub tone: Tone,
    pub job_description: String,
    pub resume_text: String,
    pub extra_notes: Option<String>,
}

pub fn build_user_prompt(req: &DraftRequest) -> String {
    let extra = req
        .extra_notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("None");

    format!(
        "Write a cover letter for:
- Candidate name: {name}
- Target job title: {title}
- Company: {company}
Tone: {tone}

Job description:
{jd}

Resume text:
{resume}

Anything else to include:
{extra}

Constraints:
- 250-400 words
- 3-4 short paragraphs plus a closing
- Name the company and the role explicitly
- Draw 2-3 specific connections between the resume and the job description
",
        name = req.input_full_name,
        title = req.job_title,
        company = req.company_name,
        tone = req.tone.guide(),
        jd = req.job_description,
        resume = req.resume_text,
        extra = extra,
    )
}
