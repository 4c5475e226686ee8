//! Plain stdin prompts.

use std::io::{self, BufRead, Write};

use achsync_core::{
    auth::{parse_expiry, AcquireError, AcquisitionStrategy, Credential},
    Achievement, Game,
};

/// Reads a token typed by the user. Safe to re-invoke on expiry because it
/// simply asks again.
pub struct PromptToken;

impl AcquisitionStrategy for PromptToken {
    fn acquire(&self) -> Result<Credential, AcquireError> {
        let failed = |err: io::Error| AcquireError::Failed {
            strategy: "prompt",
            reason: err.to_string(),
        };
        let token = ask("Insert the token (<userHash>;<token>)").map_err(failed)?;
        if token.is_empty() {
            return Err(AcquireError::Empty(self.name()));
        }
        let expiration =
            ask("Token expiration (ISO-8601, empty if unknown)").map_err(failed)?;

        let credential = Credential::new(token);
        Ok(match parse_expiry(&expiration) {
            Some(expires_at) => credential.with_expiry(expires_at),
            None => credential,
        })
    }

    fn name(&self) -> &'static str {
        "prompt"
    }
}

/// How the user wants to proceed after the catalogue is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Discover and unlock everything.
    All,
    /// Pick games and achievements one at a time.
    Select,
    /// Leave.
    Quit,
}

/// Print `message` and read one trimmed line.
pub fn ask(message: &str) -> io::Result<String> {
    let mut out = io::stdout();
    write!(out, "{message}\n: ")?;
    out.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Yes/no question; anything but `1`/`y` is no.
pub fn confirm(message: &str) -> io::Result<bool> {
    let answer = ask(&format!("{message}\n(1) Yes\n(2) No"))?;
    Ok(matches!(answer.as_str(), "1" | "y" | "Y" | "yes"))
}

/// Ask for the workflow.
pub fn mode() -> io::Result<Mode> {
    loop {
        let answer = ask("(1) Unlock everything\n(2) Select games and achievements\n(q) Quit")?;
        match answer.as_str() {
            "1" => return Ok(Mode::All),
            "2" => return Ok(Mode::Select),
            "q" | "Q" => return Ok(Mode::Quit),
            _ => continue,
        }
    }
}

/// Let the user pick one of `games`; `None` means back/quit.
pub fn choose_game<'a>(
    games: &[&'a Game],
    allow_all: bool,
) -> io::Result<Option<Choice<&'a Game>>> {
    let mut out = io::stdout();
    for (index, game) in games.iter().enumerate() {
        writeln!(out, "({}) {}", index + 1, game.display_name())?;
    }
    if allow_all {
        writeln!(out, "({}) All", games.len() + 1)?;
    }
    pick(games, allow_all, "Enter the game number, or q to go back")
}

/// Let the user pick one of `achievements`; `None` means back.
pub fn choose_achievement<'a>(
    achievements: &[&'a Achievement],
) -> io::Result<Option<Choice<&'a Achievement>>> {
    let mut out = io::stdout();
    for (index, achievement) in achievements.iter().enumerate() {
        writeln!(out, "({}) {}", index + 1, achievement.display_name())?;
    }
    pick(
        achievements,
        false,
        "Enter the achievement number to unlock, or q to return to the game list",
    )
}

/// Result of a numbered menu.
#[derive(Debug, Clone, Copy)]
pub enum Choice<T> {
    /// One entry.
    One(T),
    /// The trailing "All" entry.
    All,
}

fn pick<T: Copy>(items: &[T], allow_all: bool, message: &str) -> io::Result<Option<Choice<T>>> {
    loop {
        let answer = ask(message)?;
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        let Ok(number) = answer.parse::<usize>() else {
            continue;
        };
        if allow_all && number == items.len() + 1 {
            return Ok(Some(Choice::All));
        }
        if let Some(item) = number.checked_sub(1).and_then(|index| items.get(index)) {
            return Ok(Some(Choice::One(*item)));
        }
    }
}

/// Print a line to stdout.
pub fn say(message: impl AsRef<str>) -> io::Result<()> {
    writeln!(io::stdout(), "{}", message.as_ref())
}
