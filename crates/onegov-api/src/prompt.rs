//! Prompt construction and source extraction for the chat endpoint.

use std::sync::LazyLock;

use chrono::NaiveDate;
use onegov_core::{assistant::Prompt, domain::Persona};
use regex::Regex;
use serde::Serialize;

use crate::memory::{Turn, asked_before, render_context};

pub const DEFAULT_LANGUAGE: &str = "en";

// ─── Persona and state context ───────────────────────────────────────────────

pub fn persona_context(persona: Persona) -> &'static str {
  match persona {
    Persona::Teacher => {
      "👩‍🏫 **User Profile: Teacher**
- Focus on education-related schemes, teacher training programs, allowances, and education policies.
- Prioritize schemes like: Teacher training schemes, education allowances, scholarship programs for teachers' children, etc.
- Provide information relevant to educators and academic professionals."
    }
    Persona::Farmer => {
      "👨‍🌾 **User Profile: Farmer**
- Focus on agricultural schemes, crop insurance, subsidies, and farmer welfare programs.
- Prioritize schemes like: PM Kisan, crop insurance, agricultural subsidies, loan schemes, etc.
- Provide information relevant to farmers and agricultural workers."
    }
    Persona::Student => {
      "🎓 **User Profile: Student**
- Focus on scholarship schemes, education policies, exam-related schemes, and student benefits.
- Prioritize schemes like: Scholarships, education loans, exam fee waivers, student allowances, etc.
- Provide information relevant to students and educational pursuits."
    }
    Persona::Senior => {
      "👵 **User Profile: Senior Citizen**
- Focus on pension schemes, healthcare benefits, senior citizen discounts, and welfare programs.
- Prioritize schemes like: Old age pension, health insurance, senior citizen benefits, etc.
- Provide information relevant to senior citizens and retirees."
    }
    Persona::JobSeeker => {
      "💼 **User Profile: Job Seeker**
- Focus on employment schemes, skill development programs, job training, and employment benefits.
- Prioritize schemes like: Skill development programs, employment generation schemes, job training, etc.
- Provide information relevant to job seekers and unemployed individuals."
    }
    Persona::General => {
      "👤 **User Profile: General Citizen**
- Provide information about all types of government schemes.
- Cover a wide range of schemes including education, health, employment, agriculture, etc."
    }
  }
}

fn state_context(state: &str) -> String {
  format!(
    "📍 **User's State**: {state} - Prioritize schemes available in {state} and state-specific information."
  )
}

// ─── Prompt ──────────────────────────────────────────────────────────────────

/// Everything the prompt depends on for one chat turn.
#[derive(Debug, Clone, Copy)]
pub struct ChatContext<'a> {
  pub message:  &'a str,
  pub language: &'a str,
  /// Raw persona name as sent by the client.
  pub persona:  Option<&'a str>,
  pub state:    Option<&'a str>,
  /// Earlier turns of this conversation, oldest first.
  pub history:  &'a [Turn],
}

pub fn system_instruction(ctx: &ChatContext<'_>) -> String {
  let mut user_context = String::new();
  if let Some(p) = ctx.persona {
    user_context.push_str(persona_context(Persona::from_name(p)));
  }
  if let Some(s) = ctx.state {
    if !user_context.is_empty() {
      user_context.push('\n');
    }
    user_context.push_str(&state_context(s));
  }
  let language = ctx.language;

  format!(
    "You are **ONEGOV AI**, an extremely friendly, helpful, human-like assistant
created for the Indian public to ask questions about **Government Schemes only**.

✨ PERSONALITY
- Speak warmly, like a real human.
- Be caring, supportive, and respectful, like a helpful government officer.
- Use simple, easy-to-understand words.
- Add light emojis in a helpful, natural way.
- Always structure the answer clearly.

👤 USER CONTEXT
{user_context}

- You already know the user's profile and state from previous conversations.
- Do not ask about their profession, state, or personal details again.
- Filter and prioritize schemes relevant to their profile and state.
- Only mention their profile or state if it is relevant to the answer.

🧠 CONVERSATION BEHAVIOR
- Treat follow-up questions as part of the same topic.
- If the user asks \"how to apply?\", \"documents?\" or \"eligibility?\", continue the previous scheme.
- Never ask questions already answered by the conversation history.
- If the user asks about the same scheme again, give a concise summary and ask what specific aspect they need.

🚫 STRICT LIMITATIONS
You must ONLY answer about government schemes: benefits, eligibility,
documents, subsidies, pensions, yojanas, and state or central programs.
For anything else, reply:
\"I can only answer Government Scheme related questions 😊\"

🌐 LANGUAGE RULE
- Respond fully in **{language}**.
- If the language is unknown, default to English.

🎨 OUTPUT FORMAT
Use markdown: **bold** headings, `-` bullet points, numbered steps for
processes. Suggested sections: Benefits, Eligibility Criteria, Required
Documents, Application Process, Official Sources. List official sources as
markdown links, e.g. `- [Source Name](URL) - Verified`."
  )
}

/// Render the system instruction and the user prompt for one chat turn.
pub fn build_prompt(ctx: &ChatContext<'_>) -> Prompt {
  let conversation = render_context(ctx.history);
  let note = if asked_before(ctx.history, ctx.message) {
    "⚠️ NOTE: User asked a similar question before. Provide a concise answer and reference previous discussion if needed."
  } else {
    ""
  };
  let persona = ctx.persona.unwrap_or("general");
  let state = ctx.state.unwrap_or("all states");
  let (message, language) = (ctx.message, ctx.language);

  let user = format!(
    "Previous conversation context:
{conversation}

{note}

Current user message:
USER: {message}

**INSTRUCTIONS:**
1. Use the user's profile ({persona}) and state ({state}) to filter relevant schemes.
2. DO NOT ask about their profile or state - you already know it.
3. Provide direct, helpful answers based on their context.
4. If this question was asked before, give a brief summary and ask what specific detail they need.
5. Format your response with clear sections using markdown.
6. Respond in {language}.

Follow ALL system rules."
  );

  Prompt {
    system: system_instruction(ctx),
    user,
  }
}

// ─── Sources ─────────────────────────────────────────────────────────────────

static MARKDOWN_LINK: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("static pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
  pub title:         String,
  pub url:           String,
  /// `YYYY-MM-DD`.
  pub last_verified: String,
  pub verified:      bool,
}

/// Every markdown link in `reply`, in order of appearance.
pub fn extract_sources(reply: &str, today: NaiveDate) -> Vec<Source> {
  let date = today.format("%Y-%m-%d").to_string();
  MARKDOWN_LINK
    .captures_iter(reply)
    .map(|c| Source {
      title:         c[1].to_owned(),
      url:           c[2].to_owned(),
      last_verified: date.clone(),
      verified:      true,
    })
    .collect()
}
