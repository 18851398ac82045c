use std::time::Duration;

use anyhow::Context as _;
use cmdwerk::{Command, Context, ParseOptions, Slot, TomlParser};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Slot::new(String::new());
    let limit = Slot::new(42u64);
    let name = Slot::new(String::new());
    let timeout = Slot::new(5.0f64);
    let tags = Slot::new(Vec::new());

    let mut root = Command::new("tour")
        .short_usage("tour [flags] <subcommand> [args...]")
        .long_help("A command touring the capabilities of cmdwerk.\n\nFlags are read from the command line, then TOUR_* environment\nvariables, then the TOML file given through -config.")
        .options(
            ParseOptions::new()
                .env_var_prefix("TOUR")
                .config_file_flag("config")
                .config_parser(TomlParser)
                .allow_missing_config_file(),
        )
        .flags({
            let config = config.clone();
            let limit = limit.clone();
            let timeout = timeout.clone();
            let tags = tags.clone();
            move |fs| {
                fs.string_var(&config, "config", "", "TOML config file");
                fs.uint_var(&limit, "limit", 42, "limit the number of things");
                fs.float_var(&timeout, "timeout", 5.0, "seconds before giving up");
                fs.func("tag", "add a tag, can be repeated", {
                    let tags = tags.clone();
                    move |value| {
                        tags.borrow_mut().push(value.to_owned());
                        Ok(())
                    }
                });
            }
        })
        .subcommand(
            Command::new("greet")
                .short_usage("tour greet [-name <name>]")
                .short_help("greet someone")
                .flags({
                    let name = name.clone();
                    move |fs| fs.string_var(&name, "name", "world", "who to greet")
                })
                .exec({
                    let tags = tags.clone();
                    move |ctx, _| {
                        if let Some(error) = ctx.err() {
                            return Err(error.into());
                        }

                        println!("Hello, {}! (tags: {:?})", name.get(), tags.get());
                        Ok(())
                    }
                }),
        )
        .subcommand(
            Command::new("count")
                .short_usage("tour count <item>...")
                .short_help("count items up to -limit")
                .exec(move |_, args| {
                    let n = usize::min(args.len(), limit.get() as usize);
                    println!("{} of {} items counted", n, args.len());
                    Ok(())
                }),
        );

    match root.parse(std::env::args().skip(1)) {
        Err(error) if error.is_help() => return Ok(()),
        result => result?,
    }

    let timeout = Duration::try_from_secs_f64(timeout.get())
        .with_context(|| format!("invalid -timeout {}", timeout.get()))?;
    let (ctx, _cancel) = Context::background().with_timeout(timeout);

    match root.run(&ctx) {
        Err(error) if error.is_help() => Ok(()),
        result => Ok(result?),
    }
}
