use std::io::{self, IsTerminal, Write};
use std::process::{Command, Stdio};

/// Print `output`, piping it through `$GLA_PAGER` / `$PAGER` when it does not
/// fit on the terminal.
pub fn print_with_pager(output: &str) -> io::Result<()> {
    let stdout = io::stdout();
    if !stdout.is_terminal() {
        println!("{output}");
        return Ok(());
    }

    let (_, term_height) = crossterm::terminal::size().unwrap_or((80, 24));
    if output.lines().count() <= term_height as usize {
        println!("{output}");
        return Ok(());
    }

    let pager = ["GLA_PAGER", "PAGER"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| "less -R".into());

    let mut parts = pager.split_whitespace();
    let cmd = parts.next().unwrap_or("less");
    let args: Vec<&str> = parts.collect();

    let mut child = match Command::new(cmd).args(args).stdin(Stdio::piped()).spawn() {
        Ok(c) => c,
        Err(err) => {
            tracing::debug!(pager = %pager, error = %err, "pager unavailable");
            println!("{output}");
            return Ok(());
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = writeln!(stdin, "{output}");
    }

    let _ = child.wait();
    Ok(())
}
