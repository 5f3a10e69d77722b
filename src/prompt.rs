// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Yes/no confirmation.
//!
//! Some steps of a workflow offer to fix what they found, e.g., pushing a
//! branch that the remote does not know about yet. Whether the user gets asked
//! depends on how sitefab was started: a person at a terminal gets an
//! [`InquireConfirm`] prompt, while an unattended release run gets
//! [`AssumeDefault`], which never blocks and always gives the same answer.

use inquire::InquireError;
use tracing::{debug, instrument};

/// Capability to ask a yes/no question.
pub trait Confirm {
    /// Ask `message`, with `default` as the answer suggested to the user.
    ///
    /// # Errors
    ///
    /// - Return [`PromptError`] if the question cannot be answered at all.
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;
}

impl<C> Confirm for Box<C>
where
    C: Confirm + ?Sized,
{
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        (**self).confirm(message, default)
    }
}

impl<C> Confirm for &C
where
    C: Confirm + ?Sized,
{
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        (**self).confirm(message, default)
    }
}

/// Interactive confirmation on the controlling terminal.
///
/// Blocks until the user answers. Falls back to the suggested default when
/// standard input is not a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquireConfirm;

impl Confirm for InquireConfirm {
    #[instrument(skip(self), level = "debug")]
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        match inquire::Confirm::new(message).with_default(default).prompt() {
            Ok(answer) => Ok(answer),
            Err(InquireError::NotTTY) => {
                debug!("no terminal available, answer with default {default}");
                Ok(default)
            }
            Err(error) => Err(PromptError::Inquire(error)),
        }
    }
}

/// Non-interactive confirmation.
///
/// Never asks anything. Every question gets the answer fixed at construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssumeDefault {
    answer: bool,
}

impl AssumeDefault {
    /// Construct confirmation that always answers `answer`.
    pub fn new(answer: bool) -> Self {
        Self { answer }
    }
}

impl Confirm for AssumeDefault {
    fn confirm(&self, message: &str, _default: bool) -> Result<bool> {
        debug!("unattended run, answer {:?} with {}", message, self.answer);
        Ok(self.answer)
    }
}

/// Confirmation error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Prompt was interrupted or could not be rendered.
    #[error(transparent)]
    Inquire(#[from] InquireError),
}

/// Friendly result alias :3
type Result<T, E = PromptError> = std::result::Result<T, E>;
