//! Prompt builders for reply generation
//!
//! Classifier prompts live beside their parsers in [`crate::nlu`]; the
//! prompts here shape what the assistant actually says.

use chrono::NaiveDate;

use crate::db::dates::DATE_FORMAT;
use crate::nlu::TaskIntentKind;

/// Closing question after listing tasks
pub const LIST_CLOSER: &str = "Do you want to add, complete, or reschedule any of these?";

/// Closing question after a successful change
pub const CHANGE_CLOSER: &str = "Anything else you want to remove, add, or move around?";

/// Conversational persona used for chat and search answers
#[must_use]
pub fn persona_prompt(assistant_name: &str, user: Option<&str>) -> String {
    let speaker = user.unwrap_or("not identified yet");

    [
        format!(
            "You're {assistant_name}, a super friendly, highly energetic, and genuinely helpful companion."
        ),
        "Your memory and context come entirely from the conversation history provided.".to_string(),
        format!("The current speaker is {speaker}. Keep this in mind for all your interactions."),
        "Sound extremely human and casual, like a friend having a quick chat. Your focus is engaging conversation, quick information retrieval, and executing commands (tasks, time checks).".to_string(),
        "Keep your answer brief, highly casual, and under 40 words.".to_string(),
        "Always use contractions (it's, you're, don't) and simple, natural language. Avoid formal or corporate phrasing.".to_string(),
        "Your output is read aloud. Never use markdown, lists, or emoji. Use fillers like 'oh', 'well', or 'hmm' and punctuation (commas, ellipses) for natural pauses.".to_string(),
        "End naturally without asking another question.".to_string(),
    ]
    .join(" ")
}

/// Prompt asking for a report line and a spoken confirmation of a task result
#[must_use]
pub fn task_response_prompt(
    assistant_name: &str,
    intent: TaskIntentKind,
    user: &str,
    payload_json: &str,
    today: NaiveDate,
) -> String {
    let mut sections = Vec::new();

    sections.push(format!(
        "You are {assistant_name}, a super friendly and casual assistant. Generate two outputs in a single JSON block:\n\
         1. A formal, structured text output for display and reporting.\n\
         2. A conversational, human-like speech output for text-to-speech."
    ));

    sections.push(format!(
        "SYSTEM CONTEXT:\n- Today's Date: {}\n- Intent: {intent}\n- User: {user}\n- Data: {payload_json}",
        today.format(DATE_FORMAT)
    ));

    sections.push(
        "STYLING RULES for conversational_speech:\n\
         1. Be friendly, energetic, and use contractions (you've got, it's done).\n\
         2. Be brief and convey the outcome directly.\n\
         3. Do not use markdown (asterisks, hashtags, backticks) and do not use any quotation marks.\n\
         4. Speak directly to the user (use 'you')."
            .to_string(),
    );

    if intent != TaskIntentKind::ListTasks {
        sections.push(
            "5. Start directly with the confirmation. No opening greeting like 'Hey [User]' or 'Got it [User]'."
                .to_string(),
        );
    }

    sections.push(date_rule(intent));

    sections.push(
        "JSON Output Format (a single JSON object):\n\
         {\n  \"structured_text\": \"A clear, multi-line, non-conversational summary. Format: ACTION: [ACTION NAME]\\nDetails: [relevant data].\",\n  \"conversational_speech\": \"The friendly, casual response ready for speaking.\"\n}"
            .to_string(),
    );

    sections.push(scenario(intent));

    sections.join("\n\n")
}

fn date_rule(intent: TaskIntentKind) -> String {
    let rule = match intent {
        TaskIntentKind::AddTask | TaskIntentKind::RescheduleTask => {
            "DATE RULE: The user asked for this date, so state it literally using the month, day, and year from the Data (e.g. 'due on February 13th, 2025'). Never use relative terms like tomorrow, next week, or next Sunday."
        }
        TaskIntentKind::ListTasks => {
            "DATE RULE: For each task, if it is due today say 'due today'; if due tomorrow say 'due tomorrow'; if due later say the month and day (e.g. 'due on January 13th')."
        }
        TaskIntentKind::CompleteTask => {
            "DATE RULE: Only mention a date if the Data has one, and then state it literally."
        }
    };

    format!(
        "{rule}\nPast dates: say the task was due on that specific day (e.g. 'which was due on Tuesday, November 11th')."
    )
}

fn scenario(intent: TaskIntentKind) -> String {
    match intent {
        TaskIntentKind::ListTasks => format!(
            "SCENARIO LIST_TASKS:\n\
             - Data has a list of reminders (task, due_date, id), already sorted soonest first.\n\
             - structured_text: 'ACTION: LISTED TASKS' then one line per task as '[task] (Due: [due_date])'. No numbering.\n\
             - conversational_speech: a friendly opener, the tasks listed casually, ending with: '{LIST_CLOSER}'"
        ),
        TaskIntentKind::AddTask => format!(
            "SCENARIO ADD_TASK:\n\
             - Data contains task and due_date.\n\
             - structured_text: 'ACTION: ADDED TASK\\nTask: [task]\\nDue: [due_date]'.\n\
             - conversational_speech: confirm the task was added, ending with: '{CHANGE_CLOSER}'"
        ),
        TaskIntentKind::CompleteTask => format!(
            "SCENARIO COMPLETE_TASK:\n\
             - Data contains success and description (or keyword when success is false).\n\
             - structured_text: 'ACTION: COMPLETED TASK\\nTask: [description]', or 'ACTION: FAILED TO COMPLETE TASK\\nKeywords: [keyword]'.\n\
             - conversational_speech: on success confirm the completion, ending with: '{CHANGE_CLOSER}'. On failure say the task was not found and nothing was changed."
        ),
        TaskIntentKind::RescheduleTask => format!(
            "SCENARIO RESCHEDULE_TASK:\n\
             - Data contains success, description, old_date and new_date (or keyword when success is false).\n\
             - structured_text: 'ACTION: RESCHEDULED TASK\\nTask: [description]\\nOld Due: [old_date]\\nNew Due: [new_date]', or 'ACTION: FAILED TO RESCHEDULE TASK\\nKeywords: [keyword]'.\n\
             - conversational_speech: on success confirm the new date, ending with: '{CHANGE_CLOSER}'. On failure say the task was not found and nothing was changed."
        ),
    }
}

/// User turn wrapping search results around the question
#[must_use]
pub fn search_prompt(context: &str, user: Option<&str>, question: &str) -> String {
    let speaker = user.unwrap_or("not identified");

    format!(
        "Use the following search results to answer the user's question.\n\
         Give a concise answer based only on the context provided. Do not invent information.\n\n\
         ---[SEARCH RESULTS]---\n{context}\n---[END OF RESULTS]---\n\n\
         The user currently speaking is {speaker}.\n\
         User's Question: {question}"
    )
}
