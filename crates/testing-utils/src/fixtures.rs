//! Scenario template fixtures shared by integration tests.

use std::collections::BTreeMap;

/// The default worker service set.
pub fn default_services() -> Vec<String> {
    vec![
        "text-service".to_string(),
        "voice-service".to_string(),
        "image-service".to_string(),
        "video-service".to_string(),
    ]
}

/// Helper for building submission parameter maps.
pub fn params(entries: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Two-task linear chain: CreateText feeding CreateVoice.
pub const LINEAR_CHAIN_TEMPLATE: &str = r#"
name: ScenarioCreateVoice
variables:
  PROMPT: a short story
tasks:
  - id: "{{ SHORT_UUID('text') }}"
    service: text-service
    name: CreateText
    prompt: "{{ PROMPT }}"
    params:
      model: gpt-4o-mini
  - id: "{{ SHORT_UUID('voice') }}"
    service: voice-service
    name: CreateVoice
    params:
      voice: coral
    input_refs:
      text_task_id: "{{ SHORT_UUID('text') }}"
"#;

/// Three-task chain: CreateText -> CreateVoice -> CreateVideo.
pub const THREE_STEP_CHAIN_TEMPLATE: &str = r#"
name: ScenarioNarratedVideo
variables:
  PROMPT: a short story
tasks:
  - id: "{{ SHORT_UUID('text') }}"
    service: text-service
    name: CreateText
    prompt: "{{ PROMPT }}"
  - id: "{{ SHORT_UUID('voice') }}"
    service: voice-service
    name: CreateVoice
    input_refs:
      text_task_id: "{{ SHORT_UUID('text') }}"
  - id: "{{ SHORT_UUID('video') }}"
    service: video-service
    name: CreateVideo
    input_refs:
      voice_track_id: "{{ SHORT_UUID('voice') }}"
"#;

/// Fan-out / fan-in: one CreateText, N_SLIDES slide prompts and slides,
/// a voice track, and a final video joining all of them.
pub const FAN_OUT_FAN_IN_TEMPLATE: &str = r#"
name: ScenarioCreateVideo
variables:
  PROMPT: a story
  N_SLIDES: 3
  RESOLUTION: 1920x1080
tasks:
  - id: "{{ SHORT_UUID('text') }}"
    service: text-service
    name: CreateText
    prompt: "{{ PROMPT }}"
    params:
      model: gpt-4o-mini
  - id: "{{ SHORT_UUID('slide_prompt') }}"
    service: text-service
    name: CreateSlidePrompt
    count: "{{ N_SLIDES }}"
    input_refs:
      text_task_id: "{{ SHORT_UUID('text') }}"
  - id: "{{ SHORT_UUID('slide') }}"
    service: image-service
    name: CreateSlide
    count: "{{ N_SLIDES }}"
    params:
      resolution: "{{ RESOLUTION }}"
    input_refs:
      slide_prompt_id: "{{ SHORT_UUID('slide_prompt') }}"
  - id: "{{ SHORT_UUID('voice') }}"
    service: voice-service
    name: CreateVoice
    params:
      voice: coral
    input_refs:
      text_task_id: "{{ SHORT_UUID('text') }}"
  - id: "{{ SHORT_UUID('video') }}"
    service: video-service
    name: CreateVideoFromSlides
    params:
      resolution: "{{ RESOLUTION }}"
    input_refs:
      slide_ids:
        - "{{ SHORT_UUID('slide') }}"
      voice_track_id: "{{ SHORT_UUID('voice') }}"
"#;

/// A multiplied label with count 0 that is still referenced downstream.
pub const ZERO_COUNT_TEMPLATE: &str = r#"
name: ScenarioZeroSlides
variables:
  N_SLIDES: 0
tasks:
  - id: "{{ SHORT_UUID('slide') }}"
    service: image-service
    name: CreateSlide
    count: "{{ N_SLIDES }}"
  - id: "{{ SHORT_UUID('video') }}"
    service: video-service
    name: CreateVideoFromSlides
    input_refs:
      slide_ids:
        - "{{ SHORT_UUID('slide') }}"
"#;

/// Two tasks referencing each other.
pub const CYCLIC_TEMPLATE: &str = r#"
name: ScenarioCycle
tasks:
  - id: "{{ SHORT_UUID('a') }}"
    service: text-service
    name: CreateText
    input_refs:
      other_id: "{{ SHORT_UUID('b') }}"
  - id: "{{ SHORT_UUID('b') }}"
    service: text-service
    name: CreateText
    input_refs:
      other_id: "{{ SHORT_UUID('a') }}"
"#;
