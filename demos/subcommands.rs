use cmdwerk::{Command, Context, ParseOptions, Slot};

fn remove(debug: Slot<bool>) -> Command {
    let force = Slot::new(false);

    Command::new("rm")
        .short_usage("tour rm [-force] <path>...")
        .short_help("remove something")
        .flags({
            let force = force.clone();
            move |fs| {
                fs.bool_var(&debug, "debug", debug.get(), "debug mode");
                fs.bool_var(&force, "force", false, "ignore missing paths");
            }
        })
        .exec(move |_, args| {
            if args.is_empty() {
                return Err(cmdwerk::Error::help().into());
            }

            println!("Removing: {:?} (force: {})", args, force.get());
            Ok(())
        })
}

fn add(debug: Slot<bool>) -> Command {
    Command::new("add")
        .short_usage("tour add <path>...")
        .short_help("add something")
        .flags({
            let debug = debug.clone();
            move |fs| fs.bool_var(&debug, "debug", debug.get(), "debug mode")
        })
        .exec(move |_, args| {
            if debug.get() {
                eprintln!("adding {} paths", args.len());
            }

            println!("Adding: {:?}", args);
            Ok(())
        })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let debug = Slot::new(false);

    let mut root = Command::new("tour")
        .short_usage("tour [-debug] <subcommand> [flags] [args...]")
        .long_help("A command touring the capabilities of cmdwerk.\n\nFlags can also be set through TOUR_* environment variables.")
        .options(ParseOptions::new().env_var_prefix("TOUR"))
        .flags({
            let debug = debug.clone();
            move |fs| fs.bool_var(&debug, "debug", false, "debug mode")
        })
        .subcommand(remove(debug.clone()))
        .subcommand(add(debug));

    match root.parse(std::env::args().skip(1)) {
        Err(error) if error.is_help() => return Ok(()),
        result => result?,
    }

    match root.run(&Context::background()) {
        Err(error) if error.is_help() => Ok(()),
        result => Ok(result?),
    }
}
