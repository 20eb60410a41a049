//! Prompt templates for the conversation flow
//!
//! Every turn through the assistant is a chain of small single-shot
//! prompts rather than one long chat: classify the intent, resolve
//! dates, then produce the user-facing output. Each builder here
//! returns the full prompt text for one of those steps.

use chrono::NaiveDate;

/// Formats a date the long way, e.g. "Monday, June 2, 2025"
///
/// Used wherever a prompt tells the model what today is.
pub fn format_complete_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Formats a date the short way, e.g. "Jun 2, 2025"
///
/// Used in transient status messages shown while a lookup runs.
pub fn format_abbreviated_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// Builds the intent-classification prompt
///
/// The model is instructed to answer with a single digit; the reply is
/// scanned for "1", "2", "3" in that order, so extra prose around the
/// digit is tolerated.
pub fn intent_classification(user_prompt: &str) -> String {
    format!(
        r#"INSTRUCTIONS:
Analyze the user input and reply with ONE number only.

1 if the user is asking a question, checking the schedule, or looking up information.
2 if the user is explicitly asking to CREATE, ADD, or SCHEDULE a new event.
3 if the user is explicitly asking to DELETE, REMOVE, or CANCEL an existing event.

USER INPUT: "{}"

REPLY WITH ONE OF THE NUMBERS (1, 2, or 3):"#,
        user_prompt
    )
}

/// Builds the date-or-range resolution prompt for schedule questions
pub fn date_range_resolution(user_prompt: &str, today: NaiveDate) -> String {
    format!(
        r#"YOUR RESPONSIBILITY IS TO DETERMINE WHETHER THE USER IS TALKING ABOUT A SINGLE DATE OR A TIME RANGE.

Today's date: {}
User prompt: "{}"

INSTRUCTIONS:
- If the user mentions a single day (e.g., "next Monday"), calculate that day.
- If the user talks about a time range (e.g., "this week", "next week", "this weekend"), calculate the start and end dates for that range.
- If no date or range is specified, default to today's date.

RESPOND WITH:
- For a single date: The date in format YYYY-MM-DD.
- For a time range: Two dates (start and end) in format YYYY-MM-DD, separated by a comma (e.g., "2025-12-01, 2025-12-07")."#,
        format_complete_date(today),
        user_prompt
    )
}

/// Builds the final answer prompt seeded with a schedule summary
pub fn final_answer(context: &str, user_prompt: &str) -> String {
    format!(
        r#"RESPOND TO QUESTIONS:

CONTEXT (Events found):
{}

USER PROMPT:
"{}"

INSTRUCTIONS:
Answer the user's prompt naturally using the provided context.
If there are no events, say so clearly.
Keep the response concise and friendly."#,
        context, user_prompt
    )
}

/// Builds the field-extraction prompt for event creation
pub fn event_extraction(user_prompt: &str, today: NaiveDate) -> String {
    format!(
        r#"EXTRACT EVENT DETAILS.
Today is: {}
User prompt: "{}"

Format your response EXACTLY like this:
Title: [Event Title]
Date: [Date/Time e.g. YYYY-MM-DD HH:MM]
Location: [Location or "None"]
Description: [Description or "None"]"#,
        format_complete_date(today),
        user_prompt
    )
}

/// Builds the title-identification prompt for event deletion
pub fn deletion_target(user_prompt: &str) -> String {
    format!(
        r#"IDENTIFY THE EVENT TO DELETE.
User prompt: "{}"

Reply ONLY with the exact title of the event mentioned."#,
        user_prompt
    )
}

/// Builds the field-extraction prompt for recognized document text
///
/// Recognized text is noisier than typed input, so this variant is
/// stricter about output shape than [`event_extraction`].
pub fn image_extraction(recognized_text: &str, today: NaiveDate) -> String {
    format!(
        r#"Today's date: {}

Text: "{}"


ONLY OUTPUT IN EXACT FORMAT:
Title: [Title]
Date: [Date/Time e.g. YYYY-MM-DD HH:MM]
Location: [Location] or "None"
Description: [Summary] or "None"

NOTHING ELSE SHOULD BE IN OUTPUT. NO INTRO."#,
        format_complete_date(today),
        recognized_text
    )
}
