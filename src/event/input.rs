//! Key handling for the command line and the AI prompt.
//!
//! Keys edit the focused input in place; anything that reaches outside the
//! view (sending, generating, quitting) comes back as an [`InputAction`] for
//! the app to carry out.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{Focus, ViewState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    None,
    /// Send this line to the remote shell.
    SendCommand(String),
    /// Ask the AI for a command.
    Generate(String),
    /// Send the current suggestion to the remote shell.
    ConfirmSuggestion,
    Quit,
}

/// Handle a key press against the view.
pub fn handle_key_event(view: &mut ViewState, key_evt: KeyEvent) -> InputAction {
    if key_evt.kind != KeyEventKind::Press {
        return InputAction::None;
    }
    let ctrl = key_evt.modifiers.contains(KeyModifiers::CONTROL);

    match key_evt.code {
        KeyCode::Char('q') | KeyCode::Char('Q') if ctrl => InputAction::Quit,
        KeyCode::Char('y') | KeyCode::Char('Y') if ctrl => InputAction::ConfirmSuggestion,

        KeyCode::Tab | KeyCode::BackTab => {
            view.focus = view.focus.toggled();
            InputAction::None
        }

        KeyCode::Enter => match view.focus {
            Focus::Command => {
                let line = std::mem::take(&mut view.command_input);
                if line.trim().is_empty() {
                    InputAction::None
                } else {
                    InputAction::SendCommand(line)
                }
            }
            Focus::Prompt => InputAction::Generate(view.prompt_input.trim().to_string()),
        },

        KeyCode::Esc => {
            view.status = None;
            InputAction::None
        }

        KeyCode::Backspace => {
            view.focused_input_mut().pop();
            InputAction::None
        }

        KeyCode::Char(c) if !ctrl => {
            view.focused_input_mut().push(c);
            InputAction::None
        }

        _ => InputAction::None,
    }
}
