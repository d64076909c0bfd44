//! Operator selection surface.
//!
//! Interrogation code only sees [`Selector`]: a list of labelled options goes
//! in, exactly one value (or an abort) comes out.

use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use tracing::debug;

use crate::error::ProbeError;

/// One choice offered to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption<T> {
    pub label: String,
    pub value: T,
}

impl<T> SelectOption<T> {
    pub fn new(label: impl Into<String>, value: T) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

impl SelectOption<String> {
    /// Options whose label is also the value.
    pub fn plain(values: &[String]) -> Vec<Self> {
        values
            .iter()
            .map(|value| SelectOption::new(value.clone(), value.clone()))
            .collect()
    }
}

pub trait Selector {
    /// Present `options` and return the chosen value.
    ///
    /// An empty list, or an operator abort, fails with `NoSelectionMade`.
    fn select<T: Clone>(&self, prompt: &str, options: &[SelectOption<T>]) -> Result<T, ProbeError>;
}

/// Terminal menu backed by `dialoguer`.
pub struct TerminalSelector {
    theme: ColorfulTheme,
}

impl TerminalSelector {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for TerminalSelector {
    fn select<T: Clone>(&self, prompt: &str, options: &[SelectOption<T>]) -> Result<T, ProbeError> {
        let aborted = || ProbeError::NoSelectionMade {
            prompt: prompt.to_string(),
        };
        if options.is_empty() {
            return Err(aborted());
        }
        let labels: Vec<&str> = options.iter().map(|option| option.label.as_str()).collect();
        let choice = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(labels.as_slice())
            .default(0)
            .interact_opt()
            .map_err(|err| {
                debug!(err = %err, "selection prompt failed");
                aborted()
            })?;
        match choice {
            Some(index) => Ok(options[index].value.clone()),
            None => Err(aborted()),
        }
    }
}
