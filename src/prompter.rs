//! # User Prompts
//!
//! Interactive questions go through the [`Prompter`] trait so the engine
//! never talks to the terminal directly. Three kinds of question exist:
//!
//! - **confirm**: yes/no with a default;
//! - **select**: pick one entry of a list;
//! - **input**: free text, optionally restricted to a set of options that
//!   may be abbreviated (`(y)es/(n)o` style).
//!
//! Every prompter has an *assume-defaults* mode for unattended runs (`--yes`
//! on the command line). In that mode no input is read: confirmations
//! answer yes, selections take their default (or the first entry), and text
//! input takes its default.
//!
//! [`DialoguerPrompter`] renders prompts with `dialoguer`'s colorful theme.
//! [`ScriptedPrompter`] answers from a queue and is used by tests and
//! embedders.

use std::collections::VecDeque;
use std::sync::Mutex;

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::error::{Error, Result};

/// Source of answers to interactive questions.
pub trait Prompter: Send + Sync {
    /// True when questions are answered without reading input.
    fn assume_defaults(&self) -> bool;

    /// Ask a yes/no question.
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;

    /// Ask the user to pick one of `options`; returns its index.
    fn select(&self, message: &str, options: &[String], default: Option<usize>) -> Result<usize>;

    /// Ask for free text. With `options`, the answer must match exactly one
    /// of them (case-insensitive prefix or shorthand) and the full option is
    /// returned.
    fn input(&self, message: &str, default: Option<&str>, options: &[String]) -> Result<String>;
}

/// Terminal prompter backed by `dialoguer`.
pub struct DialoguerPrompter {
    assume_yes: bool,
    theme: ColorfulTheme,
}

impl DialoguerPrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            theme: ColorfulTheme::default(),
        }
    }
}

fn prompt_error(e: dialoguer::Error) -> Error {
    Error::Prompt {
        message: e.to_string(),
    }
}

impl Prompter for DialoguerPrompter {
    fn assume_defaults(&self) -> bool {
        self.assume_yes
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn select(&self, message: &str, options: &[String], default: Option<usize>) -> Result<usize> {
        if self.assume_yes || options.is_empty() {
            return Ok(default_selection(options, default));
        }
        Select::with_theme(&self.theme)
            .with_prompt(message)
            .items(options)
            .default(default_selection(options, default))
            .interact()
            .map_err(prompt_error)
    }

    fn input(&self, message: &str, default: Option<&str>, options: &[String]) -> Result<String> {
        if self.assume_yes {
            if let Some(default) = default {
                return Ok(default.to_string());
            }
        }

        let prompt = if options.is_empty() {
            message.to_string()
        } else {
            format!("{} {}", message, format_options(options))
        };

        let mut input = Input::<String>::with_theme(&self.theme).with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        let answer = input
            .validate_with(|answer: &String| -> std::result::Result<(), String> {
                let answer = answer.trim();
                if answer.is_empty() {
                    return Err("Input cannot be empty.".to_string());
                }
                if !options.is_empty() && match_option(answer, options).is_none() {
                    return Err("Invalid input. Please choose a valid option.".to_string());
                }
                Ok(())
            })
            .interact_text()
            .map_err(prompt_error)?;

        let answer = answer.trim();
        if options.is_empty() {
            return Ok(answer.to_string());
        }
        match_option(answer, options).ok_or_else(|| Error::Prompt {
            message: format!("'{}' does not match any option", answer),
        })
    }
}

fn default_selection(options: &[String], default: Option<usize>) -> usize {
    default
        .filter(|index| *index < options.len())
        .unwrap_or(0)
}

/// Prompter answering from a prepared queue of responses.
///
/// Confirmations consume `"y"`/`"n"`, selections a 0-based index, inputs
/// the raw text (matched against options like a terminal answer). An empty
/// response, or an exhausted queue, takes the default.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    assume_yes: bool,
    responses: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            assume_yes: false,
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// A prompter in assume-defaults mode.
    pub fn assuming_defaults() -> Self {
        Self {
            assume_yes: true,
            ..Self::default()
        }
    }

    /// Every prompt message shown so far, with the options of selections
    /// appended on separate lines.
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }

    fn record(&self, message: String) {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message);
        }
    }

    fn next(&self) -> Option<String> {
        self.responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front())
            .filter(|response| !response.is_empty())
    }
}

impl Prompter for ScriptedPrompter {
    fn assume_defaults(&self) -> bool {
        self.assume_yes
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        self.record(message.to_string());
        if self.assume_yes {
            return Ok(true);
        }
        match self.next().map(|r| r.to_lowercase()) {
            None => Ok(default),
            Some(r) if r == "y" || r == "yes" => Ok(true),
            Some(r) if r == "n" || r == "no" => Ok(false),
            Some(r) => Err(Error::Prompt {
                message: format!("unexpected confirmation answer '{}'", r),
            }),
        }
    }

    fn select(&self, message: &str, options: &[String], default: Option<usize>) -> Result<usize> {
        self.record(format!("{}\n{}", message, options.join("\n")));
        if self.assume_yes {
            return Ok(default_selection(options, default));
        }
        match self.next() {
            None => Ok(default_selection(options, default)),
            Some(r) => r
                .parse::<usize>()
                .ok()
                .filter(|index| *index < options.len())
                .ok_or_else(|| Error::Prompt {
                    message: format!("invalid selection '{}'", r),
                }),
        }
    }

    fn input(&self, message: &str, default: Option<&str>, options: &[String]) -> Result<String> {
        self.record(message.to_string());
        if self.assume_yes {
            if let Some(default) = default {
                return Ok(default.to_string());
            }
        }
        let answer = match (self.next(), default) {
            (Some(answer), _) => answer,
            (None, Some(default)) => default.to_string(),
            (None, None) => {
                return Err(Error::Prompt {
                    message: format!("no answer for '{}'", message),
                })
            }
        };
        if options.is_empty() {
            return Ok(answer);
        }
        match_option(&answer, options).ok_or_else(|| Error::Prompt {
            message: format!("'{}' does not match any option", answer),
        })
    }
}

/// Assign each option a one-character shorthand: its first character not
/// yet taken, else a number.
pub fn shorthand_map(options: &[String]) -> Vec<(String, String)> {
    let mut used: Vec<char> = Vec::new();
    let mut map = Vec::new();

    for option in options {
        let lower = option.to_lowercase();
        match lower.chars().find(|c| !used.contains(c)) {
            Some(c) => {
                used.push(c);
                map.push((c.to_string(), option.clone()));
            }
            None => map.push(((map.len() + 1).to_string(), option.clone())),
        }
    }
    map
}

/// Render options with their shorthand marked: `[(y)es/(n)o]`.
pub fn format_options(options: &[String]) -> String {
    let parts: Vec<String> = shorthand_map(options)
        .into_iter()
        .map(|(key, option)| {
            let position = option
                .char_indices()
                .find(|(_, c)| c.to_lowercase().to_string() == key);
            match position {
                Some((i, c)) => format!(
                    "{}({}){}",
                    &option[..i],
                    c,
                    &option[i + c.len_utf8()..]
                ),
                None => format!("({}){}", key, option),
            }
        })
        .collect();
    format!("[{}]", parts.join("/"))
}

/// Resolve a (possibly abbreviated) answer to one of `options`.
///
/// An exact match wins, then a shorthand, then a unique case-insensitive
/// prefix. Ambiguous or unknown answers yield `None`.
pub fn match_option(answer: &str, options: &[String]) -> Option<String> {
    let answer = answer.trim().to_lowercase();
    if answer.is_empty() {
        return None;
    }
    if let Some(exact) = options.iter().find(|o| o.to_lowercase() == answer) {
        return Some(exact.clone());
    }
    if let Some((_, option)) = shorthand_map(options)
        .into_iter()
        .find(|(key, _)| *key == answer)
    {
        return Some(option);
    }

    let mut matches = options
        .iter()
        .filter(|option| option.to_lowercase().starts_with(&answer));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    }
}
