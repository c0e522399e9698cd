use std::io::{self, Write};

use article_stream::cli::Args;
use article_stream::{
    render, stats, ArticleClient, ArticleRequest, Config, Outcome, StreamEvent,
};
use clap::Parser;
use colored::*;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the article on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(url) = &args.url {
        config = config.with_base_url(url);
    }
    let client = ArticleClient::new(config)?;

    if args.health {
        let status = client.health().await;
        if status.is_healthy() {
            println!("{} {}", "●".bright_green(), status.summary());
            return Ok(());
        }
        println!("{} {}", "●".bright_red(), status.summary());
        std::process::exit(1);
    }

    if args.models {
        let list = client.models().await?;
        if let Some(err) = &list.error {
            eprintln!("{} {}", "warning:".bright_yellow(), err);
        }
        for model in &list.models {
            println!("{model}");
        }
        return Ok(());
    }

    let request = args.request().ok_or("a topic is required")?;
    if let Err(e) = request.validate() {
        eprintln!("{} {}", "warning:".bright_yellow(), e);
        std::process::exit(2);
    }

    let ok = if args.stream {
        stream_article(&client, &request, args.html).await?
    } else {
        generate_article(&client, &request, args.html).await
    };
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn generate_article(client: &ArticleClient, request: &ArticleRequest, html: bool) -> bool {
    print_header(request);
    match client.generate(request).await {
        Ok(article) => {
            print_article(&article, html);
            print_footer(&article, "Article generated successfully!");
            true
        }
        Err(e) => {
            eprintln!("{} {}", "error:".bright_red().bold(), e);
            false
        }
    }
}

async fn stream_article(
    client: &ArticleClient,
    request: &ArticleRequest,
    html: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    print_header(request);

    let (tx, mut rx) = mpsc::unbounded_channel::<StreamEvent>();
    let mut ingestor = client.ingestor();
    let handle = ingestor.start(&client.stream_endpoint(), request, tx).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                // Chunks are cumulative; only the new suffix goes to the terminal.
                Some(StreamEvent::Chunk(text)) => {
                    if !html {
                        print!("{}", &text[printed..]);
                        let _ = io::stdout().flush();
                    }
                    printed = text.len();
                }
                Some(StreamEvent::Done(text)) => {
                    if html {
                        println!("{}", render(&text));
                    }
                    print_footer(&text, "Article streamed successfully!");
                }
                Some(StreamEvent::Error(message)) => {
                    eprintln!("\n{} {}", "error:".bright_red().bold(), message);
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                ingestor.cancel(&handle);
                eprintln!("\n{}", "cancelled".bright_yellow());
                break;
            }
        }
    }

    Ok(match handle.wait().await {
        Outcome::Completed(_) | Outcome::Cancelled => true,
        Outcome::Closed(text) => {
            if html {
                println!("{}", render(&text));
            }
            eprintln!("\n{}", "stream ended before completion".bright_yellow());
            false
        }
        Outcome::Failed(_) => false,
    })
}

fn print_header(request: &ArticleRequest) {
    eprintln!("{}", "ARTICLE GENERATOR".bright_cyan().bold());
    eprintln!("{}: {}", "Topic".bright_yellow(), request.topic.trim());
    eprintln!(
        "{}: {} | {}: {} | {}: {}",
        "Length".bright_yellow(),
        request.length,
        "Style".bright_yellow(),
        request.style,
        "Tone".bright_yellow(),
        request.tone
    );
    eprintln!("{}", "=".repeat(50).bright_blue());
}

fn print_article(article: &str, html: bool) {
    if html {
        println!("{}", render(article));
    } else {
        println!("{article}");
    }
}

fn print_footer(article: &str, message: &str) {
    eprintln!("\n{}", "=".repeat(50).bright_blue());
    eprintln!("{}", message.bright_green());
    eprintln!("{}", stats(article));
}
