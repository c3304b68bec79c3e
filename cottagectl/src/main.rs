use anyhow::Result;
use clap::{Parser, Subcommand};
use cottage_ipc::{
    read_message, write_message, Command, IpcError, Response, SessionStatus, SOCKET_PATH,
};
use std::io::ErrorKind;
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "cottagectl")]
#[command(about = "Control the Cottage study timer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start focusing on a task
    Start {
        task: String,
        #[arg(short, long, default_value_t = 60)]
        minutes: u32,
        /// Don't play a sound when time is up
        #[arg(long)]
        quiet: bool,
    },
    /// Keep focusing after time is up
    Extend {
        #[arg(short, long, default_value_t = 15)]
        minutes: u32,
    },
    /// Take a break after time is up
    Break {
        #[arg(short, long, default_value_t = 5)]
        minutes: u32,
    },
    /// End the break early
    Skip,
    /// Go back to studying after a break
    Continue {
        #[arg(short, long, default_value_t = 60)]
        minutes: u32,
        /// Start a fresh timer instead of adding to the current one
        #[arg(long)]
        fresh: bool,
    },
    /// Stop after a break without continuing
    Cancel,
    /// Abandon the running timer, keeping studied time
    Restart,
    /// End the session and record studied time
    Finish,
    /// Get session status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Print room events as they happen
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut json = false;
    let command = match cli.command {
        Commands::Start {
            task,
            minutes,
            quiet,
        } => Command::Start {
            task,
            minutes,
            play_sound: !quiet,
        },
        Commands::Extend { minutes } => Command::Extend { minutes },
        Commands::Break { minutes } => Command::Break { minutes },
        Commands::Skip => Command::SkipBreak,
        Commands::Continue { minutes, fresh } => Command::Continue {
            minutes,
            add_to_existing: !fresh,
        },
        Commands::Cancel => Command::CancelContinue,
        Commands::Restart => Command::Restart,
        Commands::Finish => Command::Finish,
        Commands::Status { json: as_json } => {
            json = as_json;
            Command::Status
        }
        Commands::Watch => return watch().await,
    };

    let response = send_command(command).await?;
    match &response {
        Response::Ok => println!("OK"),
        Response::Ignored => println!("Nothing to do in the current phase"),
        Response::Status(status) if json => {
            println!("{}", serde_json::to_string_pretty(status)?)
        }
        Response::Status(status) => print_status(status),
        Response::Rejected(reason) => eprintln!("Rejected: {}", reason),
        Response::Event(_) => {}
        Response::Error(e) => eprintln!("Error: {}", e),
    }

    let code = exit_code(&response);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Invalid input exits with 2, any other failure with 1.
fn exit_code(response: &Response) -> i32 {
    match response {
        Response::Rejected(_) => 2,
        Response::Error(_) => 1,
        _ => 0,
    }
}

fn format_secs(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn print_status(status: &SessionStatus) {
    println!("Phase: {}", status.phase.label());
    if !status.focus_task.is_empty() {
        println!("Task: {} ({}m)", status.focus_task, status.focus_minutes);
    }
    println!("Studied: {}", format_secs(status.studied_secs));
    match status.break_remaining_secs {
        Some(secs) => println!("Break left: {}", format_secs(secs)),
        None if status.remaining_secs > 0 => {
            println!(
                "Remaining: {} ({:.0}%)",
                format_secs(status.remaining_secs),
                status.progress * 100.0
            );
        }
        None => {}
    }
}

async fn connect() -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf), IpcError> {
    let stream = UnixStream::connect(SOCKET_PATH).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused => IpcError::ConnectionRefused,
        _ => IpcError::Io(e),
    })?;
    let (reader, writer) = stream.into_split();
    Ok((BufReader::new(reader), writer))
}

async fn send_command(cmd: Command) -> Result<Response> {
    let (mut reader, mut writer) = connect().await?;
    write_message(&mut writer, &cmd).await?;
    Ok(read_message(&mut reader).await?)
}

async fn watch() -> Result<()> {
    let (mut reader, mut writer) = connect().await?;
    write_message(&mut writer, &Command::Subscribe).await?;
    loop {
        match read_message::<_, Response>(&mut reader).await {
            Ok(Response::Event(event)) => {
                println!("[{}] {} {}", event.room_id, event.event, event.payload);
            }
            Ok(Response::Ok) => println!("Watching room events (ctrl-c to stop)"),
            Ok(other) => eprintln!("Unexpected response: {:?}", other),
            Err(IpcError::Closed) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_exit_non_zero() {
        assert_eq!(exit_code(&Response::Ok), 0);
        assert_eq!(exit_code(&Response::Ignored), 0);
        assert_eq!(exit_code(&Response::Rejected("no task".into())), 2);
        assert_eq!(exit_code(&Response::Error("shutting down".into())), 1);
    }

    #[test]
    fn seconds_render_as_clock() {
        assert_eq!(format_secs(3725), "01:02:05");
        assert_eq!(format_secs(-5), "00:00:00");
    }
}
