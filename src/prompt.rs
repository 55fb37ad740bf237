#![forbid(unsafe_code)]

//! Questions asked of the operator the first time a channel is seen, and
//! before a finished channel is scraped again.

use anyhow::{Result, bail};
use dialoguer::{Confirm, Input, console::Term};

use crate::checkpoint::ChannelScrapeState;

pub trait Prompter {
    /// Category label the collection is filed under, e.g. `lb`.
    fn category(&self, channel_id: &str) -> Result<String>;
    /// Short channel name used in the collection's blob name.
    fn channel_name(&self, channel_id: &str) -> Result<String>;
    fn confirm_rescrape(&self, state: &ChannelScrapeState) -> Result<bool>;
}

impl<P: Prompter + ?Sized> Prompter for &P {
    fn category(&self, channel_id: &str) -> Result<String> {
        (**self).category(channel_id)
    }

    fn channel_name(&self, channel_id: &str) -> Result<String> {
        (**self).channel_name(channel_id)
    }

    fn confirm_rescrape(&self, state: &ChannelScrapeState) -> Result<bool> {
        (**self).confirm_rescrape(state)
    }
}

/// Blob name of a channel's collection: `<category>/<name>_comments`.
pub fn save_name(category: &str, name: &str) -> String {
    format!("{category}/{name}_comments")
}

/// Labels end up as path segments, so they stay short and plain.
pub fn validate_label(value: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("must not be empty".into());
    }
    if value.starts_with('.') {
        return Err("must not start with '.'".into());
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("unsupported character {bad:?}"));
    }
    Ok(())
}

/// Asks on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn label(prompt: &str) -> Result<String> {
        let answer: String = Input::new()
            .with_prompt(prompt)
            .validate_with(|input: &String| validate_label(input))
            .interact_text_on(&Term::stderr())?;
        Ok(answer.trim().to_string())
    }
}

/// Asks for the video a channel scrape starts from.
pub fn ask_seed_video() -> Result<String> {
    let answer: String = Input::new()
        .with_prompt("Video id from the channel to scrape (e.g. pFPd_Dhs51s)")
        .validate_with(|input: &String| validate_label(input))
        .interact_text_on(&Term::stderr())?;
    Ok(answer.trim().to_string())
}

impl Prompter for TerminalPrompter {
    fn category(&self, channel_id: &str) -> Result<String> {
        Self::label(&format!(
            "Category for channel {channel_id} (cp, lb, lcb, q, rb)"
        ))
    }

    fn channel_name(&self, _channel_id: &str) -> Result<String> {
        Self::label("Channel name (data is saved as <category>/<name>_comments)")
    }

    fn confirm_rescrape(&self, state: &ChannelScrapeState) -> Result<bool> {
        Ok(Confirm::new()
            .with_prompt(format!("{} was already fully scraped. Scrape it again?", state.save_name))
            .default(false)
            .interact_on(&Term::stderr())?)
    }
}

/// Answers taken from command-line flags, falling back to the terminal only
/// when `interactive` is set.
#[derive(Debug, Default, Clone)]
pub struct PresetPrompter {
    pub category: Option<String>,
    pub name: Option<String>,
    pub rescrape: Option<bool>,
    pub interactive: bool,
}

impl PresetPrompter {
    fn preset_label(value: Option<&String>, flag: &str) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        if let Err(reason) = validate_label(value) {
            bail!("--{flag} {value:?}: {reason}");
        }
        Ok(Some(value.trim().to_string()))
    }
}

impl Prompter for PresetPrompter {
    fn category(&self, channel_id: &str) -> Result<String> {
        match Self::preset_label(self.category.as_ref(), "category")? {
            Some(category) => Ok(category),
            None if self.interactive => TerminalPrompter.category(channel_id),
            None => bail!("channel {channel_id} is new; pass --category to file it"),
        }
    }

    fn channel_name(&self, channel_id: &str) -> Result<String> {
        match Self::preset_label(self.name.as_ref(), "name")? {
            Some(name) => Ok(name),
            None if self.interactive => TerminalPrompter.channel_name(channel_id),
            None => bail!("channel {channel_id} is new; pass --name to name its collection"),
        }
    }

    fn confirm_rescrape(&self, state: &ChannelScrapeState) -> Result<bool> {
        match self.rescrape {
            Some(answer) => Ok(answer),
            None if self.interactive => TerminalPrompter.confirm_rescrape(state),
            None => Ok(false),
        }
    }
}
