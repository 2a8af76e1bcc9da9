use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AssistantError;

/// The fixed query modes offered by the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Mode {
    #[serde(rename = "Admission Assistance")]
    AdmissionAssistance,
    #[serde(rename = "Clinical History Query")]
    ClinicalHistoryQuery,
}

/// Sampling parameters sent with every request of a mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

/// Static request template bound to a [`Mode`]
#[derive(Debug, Clone, PartialEq)]
pub struct ModeProfile {
    pub system_prompt: &'static str,
    pub index_name: &'static str,
    pub semantic_configuration: &'static str,
    pub query_type: &'static str,
    pub strictness: u8,
    pub top_n_documents: u32,
    pub sampling: SamplingParams,
    /// `{query}` is replaced by the raw input. `None` sends the input as-is.
    pub user_template: Option<&'static str>,
    pub uses_embedding: bool,
    pub heading: &'static str,
    pub input_label: &'static str,
    pub placeholder: &'static str,
    pub examples: &'static [&'static str],
}

const ADMISSION_PROMPT: &str = "You are an AI Nursing assistant that helps nurses with admission. Based on nurse_protocol.pdf. ALWAYS your answers should be only max 10 steps to proceed. No additional text";

const CLINICAL_PROMPT: &str = "You are an AI nursing assistant that helps people find information about clinic history in retrieved data. ALWAYS your answers should be only a resume of the clinic history. All translated to English. No additional text";

static ADMISSION: ModeProfile = ModeProfile {
    system_prompt: ADMISSION_PROMPT,
    index_name: "index-nurse-1",
    semantic_configuration: "vector-1726896547803-semantic-configuration",
    query_type: "simple",
    strictness: 3,
    top_n_documents: 5,
    sampling: SamplingParams {
        max_tokens: 500,
        temperature: 0.4,
        top_p: 0.95,
        frequency_penalty: 0.0,
        presence_penalty: 0.0,
    },
    user_template: None,
    uses_embedding: false,
    heading: "Nursing Admission Assistant with Azure OpenAI",
    input_label: "Ask me a question regarding patient admissions:",
    placeholder: "Enter your question here",
    examples: &[
        "What are the steps for admission?",
        "What should I do if the patient has a fever?",
        "What are the admission procedures for a patient with a history of hypertension?",
        "Man 55 years chest pain",
    ],
};

static CLINICAL: ModeProfile = ModeProfile {
    system_prompt: CLINICAL_PROMPT,
    index_name: "great-nut-723ncdwd3g",
    semantic_configuration: "azureml-default",
    query_type: "vector_simple_hybrid",
    strictness: 3,
    top_n_documents: 6,
    sampling: SamplingParams {
        max_tokens: 800,
        temperature: 0.5,
        top_p: 0.78,
        frequency_penalty: 0.0,
        presence_penalty: 0.0,
    },
    user_template: Some("Necesito busques la historía clínica del paciente: {query}"),
    uses_embedding: true,
    heading: "Clinical History Query",
    input_label: "Enter the name of a patient to find the history:",
    placeholder: "Patient name",
    examples: &["María Fernandez", "Jorge Ramírez", "Pablo Lopez", "Ana García"],
};

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::AdmissionAssistance, Mode::ClinicalHistoryQuery];

    pub fn label(self) -> &'static str {
        match self {
            Mode::AdmissionAssistance => "Admission Assistance",
            Mode::ClinicalHistoryQuery => "Clinical History Query",
        }
    }

    pub fn profile(self) -> &'static ModeProfile {
        match self {
            Mode::AdmissionAssistance => &ADMISSION,
            Mode::ClinicalHistoryQuery => &CLINICAL,
        }
    }
}

impl ModeProfile {
    /// User message content for a raw query
    pub fn user_content(&self, query: &str) -> String {
        match self.user_template {
            Some(template) => template.replace("{query}", query),
            None => query.to_string(),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for Mode {
    type Error = AssistantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Mode {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "admission assistance" | "admission" => Ok(Mode::AdmissionAssistance),
            "clinical history query" | "clinical" => Ok(Mode::ClinicalHistoryQuery),
            _ => Err(AssistantError::UnknownMode(s.to_string())),
        }
    }
}
