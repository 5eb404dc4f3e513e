// Parse an INI file and print what we got.
//
// Usage: cargo run --example dump -- [--raw] FILE
//
// With --raw the sections are neither merged nor resolved.
type Result<T, E = Box<dyn std::error::Error>> = std::result::Result<T, E>;

fn main() -> Result<()> {
    env_logger::init();

    let mut raw = false;
    let mut file = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--raw" => raw = true,
            _ => file = Some(arg),
        }
    }
    let file = match file {
        Some(file) => file,
        None => {
            eprintln!("usage: dump [--raw] FILE");
            std::process::exit(1);
        }
    };

    let builder = extini::Builder::new()
        .process_env()
        .merge(!raw)
        .inherit(!raw)
        .on_env_not_found(|name, text| {
            log::warn!("environment variable {} not set", name);
            text.to_string()
        });

    let value = match builder.parse_file(file) {
        Ok(value) => value,
        Err(e) => {
            println!("{}", e);
            std::process::exit(1);
        }
    };

    println!("{:#?}", value);
    Ok(())
}
