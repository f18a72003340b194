pub fn command_form(matches: &clap::ArgMatches) {
    let filename = matches.value_of("INPUT").unwrap_or_default();
    let configuration = crate::read_configuration("form", filename);

    if let Err(e) = configuration.validate() {
        eprintln!("dvoting form: {}", e);
        std::process::exit(1);
    }

    println!("> Configuration OK: {}", configuration.main_title);
    println!("  ballot size: {} bytes", configuration.max_ballot_size());
    println!("  chunks per ballot: {}", configuration.chunks_per_ballot());
}
