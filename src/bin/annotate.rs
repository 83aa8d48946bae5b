//! annotate - 命令行前台
//!
//! 对给定页面执行去重检查，未重复时用草稿预填并提交

use annotation_relay::client::{
    connect_or_start_relay, ClientConfig, FileDraftStore, Foreground, Form, PageState,
};
use annotation_relay::ActiveTab;
use anyhow::{bail, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 命令行参数
#[derive(Debug, Default)]
struct Args {
    url: String,
    title: String,
    singer: Option<String>,
    model: Option<String>,
    language: Option<String>,
    deepfake: Option<bool>,
    check_only: bool,
    fetch: bool,
}

fn usage(program: &str) -> ! {
    eprintln!(
        "用法: {} <url> <title> [--singer S] [--model M] [--language L] [--deepfake|--bonafide] [--check-only]",
        program
    );
    eprintln!("      {} --fetch", program);
    eprintln!("例: {} https://www.youtube.com/watch?v=1 \"Song X\" --singer A --language Mandarin", program);
    std::process::exit(1);
}

fn parse_args() -> Args {
    let raw: Vec<String> = std::env::args().collect();
    let program = raw.first().cloned().unwrap_or_else(|| "annotate".to_string());

    let mut args = Args::default();
    let mut positional = Vec::new();
    let mut iter = raw.into_iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--singer" => args.singer = Some(iter.next().unwrap_or_else(|| usage(&program))),
            "--model" => args.model = Some(iter.next().unwrap_or_else(|| usage(&program))),
            "--language" => args.language = Some(iter.next().unwrap_or_else(|| usage(&program))),
            "--deepfake" => args.deepfake = Some(true),
            "--bonafide" => args.deepfake = Some(false),
            "--check-only" => args.check_only = true,
            "--fetch" => args.fetch = true,
            "-h" | "--help" => usage(&program),
            _ => positional.push(arg),
        }
    }

    if args.fetch {
        return args;
    }

    match positional.as_slice() {
        [url, title] => {
            args.url = url.clone();
            args.title = title.clone();
        }
        _ => usage(&program),
    }

    args
}

fn apply_overrides(form: &mut Form, args: &Args) {
    if let Some(ref singer) = args.singer {
        form.singer = singer.clone();
    }
    if let Some(ref model) = args.model {
        form.model = model.clone();
    }
    if let Some(ref language) = args.language {
        form.language = language.clone();
    }
    if let Some(deepfake) = args.deepfake {
        form.deepfake = deepfake;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("annotation_relay=info".parse()?))
        .init();

    let args = parse_args();
    let config = ClientConfig::new("annotate");
    let drafts = FileDraftStore::new(config.drafts_path());
    let mut client = connect_or_start_relay(config).await?;

    if args.fetch {
        let messages = client.fetch_data().await?;
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    let tab = ActiveTab {
        url: args.url.clone(),
        title: args.title.clone(),
    };

    let mut foreground = Foreground::new(client, drafts);
    let mut form = match foreground.open(&tab).await? {
        PageState::Editing { form, .. } => form,
        PageState::AlreadyExists => {
            println!("Entry already exists!");
            return Ok(());
        }
        PageState::Created { id } => {
            println!("Entry created: {}", id);
            return Ok(());
        }
    };

    if args.check_only {
        println!("No entry for {:?}", tab.title);
        println!("{:#?}", form);
        return Ok(());
    }

    apply_overrides(&mut form, &args);

    match foreground.submit(form).await {
        PageState::Created { id } => println!("Data added with ID: {}", id),
        PageState::AlreadyExists => println!("Entry already exists!"),
        PageState::Editing { error, .. } => {
            bail!("Error adding data: {}", error.unwrap_or_default())
        }
    }

    Ok(())
}
