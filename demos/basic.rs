use cmdwerk::{Command, Context, Slot};

fn main() -> anyhow::Result<()> {
    let limit = Slot::new(0u64);
    let file = Slot::new(String::new());

    let mut command = Command::new("tool")
        .short_usage("tool [-limit <n>] [-file <path>] [args...]")
        .long_help("A simple tool.")
        .flags({
            let limit = limit.clone();
            let file = file.clone();
            move |fs| {
                fs.uint_var(&limit, "limit", 10, "the limit of the operation");
                fs.string_var(&file, "file", "", "write to the file specified by <path>");
            }
        })
        .exec(move |_, args| {
            println!("limit: {}", limit.get());
            println!("file: {:?}", file.get());
            println!("args: {:?}", args);
            Ok(())
        });

    match command.parse(std::env::args().skip(1)) {
        Err(error) if error.is_help() => return Ok(()),
        result => result?,
    }

    command.run(&Context::background())?;
    Ok(())
}
