//! Line-based terminal prompts.
//!
//! Input ends (EOF) are treated as "accept the default"; a prompt without a default fails.

use anyhow::{bail, Result};
use std::io::{BufRead, Write};

/// One entry in a selection list.
pub struct Choice<'a> {
    pub value: &'a str,
    pub label: &'a str,
    pub hint: Option<&'a str>,
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// `None` on EOF.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask for a line of text until `validate` accepts it. An empty answer takes `default`.
    pub fn text(
        &mut self,
        message: &str,
        default: Option<&str>,
        validate: impl Fn(&str) -> Result<(), String>,
    ) -> Result<String> {
        loop {
            match default {
                Some(d) => write!(self.output, "{message} [{d}] ")?,
                None => write!(self.output, "{message} ")?,
            }
            self.output.flush()?;

            let answer = match (self.read_line()?, default) {
                (Some(line), _) if !line.is_empty() => line,
                (Some(_), Some(d)) => d.to_string(),
                (Some(_), None) => String::new(),
                // No more input: the default is the only answer left to try.
                (None, Some(d)) => match validate(d) {
                    Ok(()) => return Ok(d.to_string()),
                    Err(reason) => bail!("setup cancelled: no input for \"{message}\" and default is invalid: {reason}"),
                },
                (None, None) => bail!("setup cancelled: no input for \"{message}\""),
            };

            match validate(&answer) {
                Ok(()) => return Ok(answer),
                Err(reason) => writeln!(self.output, "  {reason}")?,
            }
        }
    }

    pub fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            write!(self.output, "{message} [{hint}] ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(default);
            };
            match line.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "  Please answer y or n")?,
            }
        }
    }

    fn print_choices(&mut self, choices: &[Choice<'_>], marked: impl Fn(&str) -> bool) -> Result<()> {
        for (i, choice) in choices.iter().enumerate() {
            let mark = if marked(choice.value) { "[x]" } else { "[ ]" };
            match choice.hint {
                Some(hint) => writeln!(self.output, "  {:>2}. {mark} {} ({hint})", i + 1, choice.label)?,
                None => writeln!(self.output, "  {:>2}. {mark} {}", i + 1, choice.label)?,
            }
        }
        Ok(())
    }

    /// Pick any number of choices by their 1-based numbers (comma separated).
    /// An empty answer keeps `initial`; `none` clears the selection.
    pub fn multiselect(
        &mut self,
        message: &str,
        choices: &[Choice<'_>],
        initial: &[String],
    ) -> Result<Vec<String>> {
        writeln!(self.output, "{message}")?;
        self.print_choices(choices, |v| initial.iter().any(|i| i == v))?;

        loop {
            write!(self.output, "Numbers, comma separated (enter keeps marked, `none` clears): ")?;
            self.output.flush()?;
            let line = self.read_line()?.unwrap_or_default();

            if line.is_empty() {
                return Ok(choices
                    .iter()
                    .filter(|c| initial.iter().any(|i| i == c.value))
                    .map(|c| c.value.to_string())
                    .collect());
            }
            if line.eq_ignore_ascii_case("none") {
                return Ok(Vec::new());
            }

            match parse_indices(&line, choices.len()) {
                Ok(indices) => {
                    return Ok(indices
                        .into_iter()
                        .map(|i| choices[i].value.to_string())
                        .collect())
                }
                Err(reason) => writeln!(self.output, "  {reason}")?,
            }
        }
    }

    /// Pick exactly one choice; returns its index.
    pub fn select(&mut self, message: &str, choices: &[Choice<'_>]) -> Result<usize> {
        if choices.is_empty() {
            bail!("nothing to choose from");
        }
        writeln!(self.output, "{message}")?;
        self.print_choices(choices, |_| false)?;

        loop {
            write!(self.output, "Number: ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                bail!("cancelled: no selection made");
            };
            match parse_indices(&line, choices.len()) {
                Ok(indices) if indices.len() == 1 => return Ok(indices[0]),
                Ok(_) => writeln!(self.output, "  Pick exactly one")?,
                Err(reason) => writeln!(self.output, "  {reason}")?,
            }
        }
    }
}

/// Parse `"1, 3"` into zero-based, de-duplicated indices below `len`.
fn parse_indices(line: &str, len: usize) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let n: usize = token
            .parse()
            .map_err(|_| format!("`{token}` is not a number"))?;
        if n == 0 || n > len {
            return Err(format!("{n} is out of range (1-{len})"));
        }
        if !indices.contains(&(n - 1)) {
            indices.push(n - 1);
        }
    }
    if indices.is_empty() {
        return Err("enter at least one number".into());
    }
    Ok(indices)
}

/// Validator for required fields.
pub fn required(what: &'static str) -> impl Fn(&str) -> Result<(), String> {
    move |value| {
        if value.trim().is_empty() {
            Err(format!("{what} is required"))
        } else {
            Ok(())
        }
    }
}

pub fn valid_url(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Core URL is required".into());
    }
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|_| "Please enter a valid URL".into())
}
