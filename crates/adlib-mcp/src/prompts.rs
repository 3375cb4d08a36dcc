//! Analysis prompts returned alongside prepared media.
//!
//! The client model performs the visual analysis; these prompts ask for a
//! factual breakdown whose `colors.dominant_colors`, `people_description` and
//! `text_elements` sections feed the cache's quick filters when the result is
//! saved back with `save_ad_analysis`.

pub const IMAGE_ANALYSIS_PROMPT: &str = r#"Analyze this ad image and return a JSON object with factual, objective observations only.

{
  "overall_description": "what the image shows, in one or two sentences",
  "text_elements": {
    "headline_hook": ["text meant to grab attention"],
    "value_proposition": ["text explaining the benefit"],
    "call_to_action": ["text telling the viewer what to do"],
    "referral": ["text asking the viewer to share"],
    "disclaimer": ["legal text, terms, conditions"],
    "brand_name": ["company or product names"],
    "other": ["any remaining text"]
  },
  "people_description": "for each person: age range, gender, clothing, pose, expression. Empty string if nobody is shown",
  "brand_elements": "logos and their position, products shown, brand colors",
  "composition": "layout structure, visual hierarchy, composition techniques",
  "colors": {
    "dominant_colors": ["color names or hex codes, most prominent first"],
    "distribution": "approximate share of each color",
    "background": "background color or type"
  },
  "images": "visual elements beyond text, filters, photography style, setting",
  "technical_details": "static or animated, aspect ratio, text contrast, overall quality",
  "layout_positioning": "position of each major element, text overlay versus separate text areas"
}

Transcribe all text exactly. Do not add marketing analysis, strategy or subjective judgement."#;

pub const VIDEO_ANALYSIS_PROMPT: &str = r#"Analyze this ad video and return a JSON object with factual, objective observations only.

{
  "overall_description": "what happens in the video, in order",
  "scenes": [
    {"start": "mm:ss", "end": "mm:ss", "description": "setting, action, camera movement"}
  ],
  "text_elements": {
    "on_screen_text": ["all text overlays, transcribed exactly"],
    "call_to_action": ["text telling the viewer what to do"],
    "brand_name": ["company or product names"]
  },
  "audio": "voice-over transcript, music style, sound effects",
  "people_description": "for each person: age range, gender, clothing, role in the video. Empty string if nobody is shown",
  "brand_elements": "logos, products shown and when they first appear",
  "colors": {
    "dominant_colors": ["color names or hex codes, most prominent first"]
  },
  "technical_details": "duration, aspect ratio, pacing (cuts per scene), captions present or not",
  "hook": "what is shown in the first three seconds"
}

Report only what is seen and heard. Do not add marketing analysis, strategy or subjective judgement."#;
