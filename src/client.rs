//! Command-line client for data-service.
//!
//! Sends one request and prints the reply:
//!
//! ```text
//! data-client PUT /data/colour deep blue
//! data-client GET /data/colour
//! ```
//!
//! With no METHOD and PATH it prompts for them, then for the body.

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "data-client")]
#[command(version = "0.1.0")]
#[command(about = "Send one request to a data-service server", long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8002")]
    server: String,

    /// Request method (GET, PUT, POST, DELETE)
    method: Option<String>,

    /// Request path, e.g. /data/first
    path: Option<String>,

    /// Request body; words are joined with single spaces
    body: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (request_line, body) = match (args.method, args.path) {
        (Some(method), Some(path)) => (format!("{} {}", method, path), args.body.join(" ")),
        (Some(_), None) => return Err("a PATH is required after METHOD".into()),
        _ => {
            let mut stdin = BufReader::new(tokio::io::stdin());
            let request_line = prompt(&mut stdin, "Input '$method $path': ").await?;
            let body = prompt(&mut stdin, "Input body: ").await?;
            (request_line, body)
        }
    };

    let request = format_request(&request_line, &body);
    println!("[CLIENT] Sending request: {}", request);

    let mut stream = TcpStream::connect(&args.server).await?;
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    // The server closes the connection after its single reply
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    println!("[CLIENT] Got reply: {}", reply.trim());

    Ok(())
}

fn format_request(request_line: &str, body: &str) -> String {
    format!("{} HTTP/1.0\r\n\r\n{}", request_line.trim(), body)
}

async fn prompt<R>(reader: &mut R, message: &str) -> std::io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    reader.read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_request() {
        assert_eq!(
            format_request("PUT /data/colour", "deep blue"),
            "PUT /data/colour HTTP/1.0\r\n\r\ndeep blue"
        );
        assert_eq!(
            format_request(" GET /data/first \n", ""),
            "GET /data/first HTTP/1.0\r\n\r\n"
        );
    }

    #[test]
    fn test_args_join_body() {
        let args = Args::parse_from(["data-client", "PUT", "/data/colour", "deep", "blue"]);
        assert_eq!(args.server, "127.0.0.1:8002");
        assert_eq!(args.method.as_deref(), Some("PUT"));
        assert_eq!(args.path.as_deref(), Some("/data/colour"));
        assert_eq!(args.body.join(" "), "deep blue");
    }

    #[tokio::test]
    async fn test_prompt_strips_newline() {
        let mut input = BufReader::new(&b"GET /data/first\r\nrest\n"[..]);
        let line = prompt(&mut input, "").await.unwrap();
        assert_eq!(line, "GET /data/first");
    }
}
