//! REPL input parsing and execution

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use colored::*;
use sluice_transport::{Client, ClientError, TransferReport};
use tokio::runtime::Runtime;

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Get(String),
    Put(String),
    Pwd,
    Dir,
    Cd(String),
    Size(String),
    Syst,
    LocalPwd,
    LocalDir,
    LocalCd(String),
    Help,
    Clear,
    Quit,
    /// Anything else is sent to the server as typed
    Raw(String),
}

/// Parse a prompt line. Commands are case-insensitive; the argument is the
/// rest of the line, so paths may contain spaces.
pub fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim()),
        None => (line, ""),
    };

    let required = |name: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage: {} <path>", name))
        } else {
            Ok(rest.to_string())
        }
    };

    let input = match word.to_lowercase().as_str() {
        "get" => Input::Get(required("get")?),
        "put" => Input::Put(required("put")?),
        "pwd" => Input::Pwd,
        "dir" | "ls" => Input::Dir,
        "cd" => Input::Cd(required("cd")?),
        "size" => Input::Size(required("size")?),
        "syst" => Input::Syst,
        "!pwd" => Input::LocalPwd,
        "!dir" | "!ls" => Input::LocalDir,
        "!cd" => Input::LocalCd(required("!cd")?),
        "?" | "help" => Input::Help,
        "clear" => Input::Clear,
        "quit" | "exit" => Input::Quit,
        _ => Input::Raw(line.to_string()),
    };
    Ok(input)
}

/// What the REPL does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Quit,
}

/// Run one parsed input. Remote failures come back as [`ClientError`];
/// the caller decides whether the connection survived.
pub fn execute(rt: &Runtime, client: &mut Client, input: Input) -> Result<Step, ClientError> {
    match input {
        Input::Get(remote) => {
            let local = local_name(&remote)?;
            let report = rt.block_on(client.get(&remote, &local, progress_printer()))?;
            finish_progress(&report);
            println!("{}", format!("Received {} bytes.", report.bytes).green());
        }
        Input::Put(local) => {
            let path = PathBuf::from(&local);
            let remote = local_name(&local)?;
            let remote = remote.to_string_lossy();
            let report = rt.block_on(client.put(&path, &remote, progress_printer()))?;
            finish_progress(&report);
            println!("{}", format!("Sent {} bytes.", report.bytes).green());
        }
        Input::Pwd => println!("{}", rt.block_on(client.pwd())?),
        Input::Cd(path) => println!("{}", rt.block_on(client.cd(&path))?.green()),
        Input::Size(path) => {
            let size = rt.block_on(client.size(&path))?;
            println!("{}", format!("{} bytes", size).yellow());
        }
        Input::Syst => println!("{}", rt.block_on(client.syst())?),
        Input::Dir => {
            let mut out = Vec::new();
            rt.block_on(client.dir(&mut out))?;
            print!("{}", String::from_utf8_lossy(&out));
            println!();
        }
        Input::Raw(line) => {
            let reply = rt.block_on(client.raw(&line))?;
            println!("{}", reply.red());
        }
        Input::LocalPwd => match std::env::current_dir() {
            Ok(dir) => println!("{}", dir.display()),
            Err(e) => eprintln!("{} {}", "Error:".red(), e),
        },
        Input::LocalCd(dir) => match std::env::set_current_dir(&dir) {
            Ok(()) => println!("{}", "Directory changed.".green()),
            Err(_) => eprintln!("{}", format!("cd: {}: No such file or directory", dir).red()),
        },
        Input::LocalDir => print_local_listing(),
        Input::Help => print_help(),
        Input::Clear => print!("\x1B[2J\x1B[1;1H"),
        Input::Quit => return Ok(Step::Quit),
    }
    Ok(Step::Continue)
}

/// Final path component, used as the name on the other side
fn local_name(path: &str) -> Result<PathBuf, ClientError> {
    Path::new(path)
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| ClientError::Local {
            path: PathBuf::from(path),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
        })
}

/// Live byte counter on interactive terminals
fn progress_printer() -> impl FnMut(u64) {
    let live = std::io::stdout().is_terminal();
    move |bytes| {
        if live {
            print!("\r  {} bytes", bytes);
            let _ = std::io::stdout().flush();
        }
    }
}

fn finish_progress(report: &TransferReport) {
    if report.bytes > 0 && std::io::stdout().is_terminal() {
        println!();
    }
}

fn print_local_listing() {
    let dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return;
        }
    };
    match sluice_core::list_directory(&dir) {
        Ok(entries) => {
            for entry in entries {
                println!("{}", entry);
            }
        }
        Err(e) => eprintln!("{} {}", "Error:".red(), e),
    }
}

pub fn print_help() {
    println!(
        r#"
{}

{}
  get <path>      Download a file into the local directory
  put <path>      Upload a local file
  dir             List the server directory
  cd <dir>        Change the server directory
  pwd             Print the server directory
  size <path>     Size of a server file
  syst            Server platform

{}
  !dir            List the local directory
  !cd <dir>       Change the local directory
  !pwd            Print the local directory

{}
  ? / help        Show this help
  clear           Clear screen
  quit / exit     Close the session and exit
"#,
        "Sluice Commands".cyan().bold(),
        "Remote".yellow().bold(),
        "Local".yellow().bold(),
        "Session".yellow().bold(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_commands() {
        assert_eq!(parse_input("get notes.txt"), Ok(Input::Get("notes.txt".into())));
        assert_eq!(parse_input("PUT my file.txt  "), Ok(Input::Put("my file.txt".into())));
        assert_eq!(parse_input("dir"), Ok(Input::Dir));
        assert_eq!(parse_input("Cd .."), Ok(Input::Cd("..".into())));
        assert_eq!(parse_input("size a"), Ok(Input::Size("a".into())));
        assert_eq!(parse_input("syst"), Ok(Input::Syst));
        assert_eq!(parse_input("pwd"), Ok(Input::Pwd));
    }

    #[test]
    fn test_parse_local_commands() {
        assert_eq!(parse_input("!pwd"), Ok(Input::LocalPwd));
        assert_eq!(parse_input("!dir"), Ok(Input::LocalDir));
        assert_eq!(parse_input("!cd /tmp"), Ok(Input::LocalCd("/tmp".into())));
        assert_eq!(parse_input("?"), Ok(Input::Help));
        assert_eq!(parse_input("exit"), Ok(Input::Quit));
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(parse_input("get"), Err("usage: get <path>".to_string()));
        assert!(parse_input("cd   ").is_err());
        assert!(parse_input("!cd").is_err());
    }

    #[test]
    fn test_unknown_goes_to_server() {
        assert_eq!(parse_input("mkdir x"), Ok(Input::Raw("mkdir x".into())));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("/var/data/report.csv").unwrap(), PathBuf::from("report.csv"));
        assert_eq!(local_name("report.csv").unwrap(), PathBuf::from("report.csv"));
        assert!(local_name("..").is_err());
        assert!(local_name("/").is_err());
    }
}
