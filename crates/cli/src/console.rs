use std::io::BufRead;
use std::str::FromStr;

use crossbeam_channel::Sender;

use facecam_core::detection::domain::detector_kind::DetectorKind;

/// One line typed at the interactive prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    /// Checkbox click on a detector; `None` clears the selection.
    Toggle(DetectorKind),
    Grayscale(bool),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  start | stop          begin or halt acquisition
  haar | lbp | neural   toggle a detector (selecting one clears the others)
  none                  clear the detector selection
  gray on|off           grayscale preview
  status                selection, session counters and frame rate
  quit                  stop and exit";

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace().map(str::to_ascii_lowercase);
        let head = words.next().ok_or_else(|| "empty command".to_string())?;
        let arg = words.next();
        let command = match (head.as_str(), arg.as_deref()) {
            ("start", None) => ConsoleCommand::Start,
            ("stop", None) => ConsoleCommand::Stop,
            ("status", None) => ConsoleCommand::Status,
            ("help" | "?", None) => ConsoleCommand::Help,
            ("quit" | "exit" | "q", None) => ConsoleCommand::Quit,
            ("gray" | "grey" | "grayscale", Some("on")) => ConsoleCommand::Grayscale(true),
            ("gray" | "grey" | "grayscale", Some("off")) => ConsoleCommand::Grayscale(false),
            (word, None) => ConsoleCommand::Toggle(word.parse()?),
            _ => return Err(format!("unrecognised command '{}'", s.trim())),
        };
        Ok(command)
    }
}

/// Reads commands from stdin on its own thread. Sends `Quit` at end of input.
pub fn spawn_reader(tx: Sender<ConsoleCommand>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ConsoleCommand>() {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        return;
                    }
                }
                Err(e) => eprintln!("{e} (type 'help')"),
            }
        }
        let _ = tx.send(ConsoleCommand::Quit);
    })
}
