use dvoting_node::NodeKeys;
use rand::RngCore;

pub fn command_keygen(matches: &clap::ArgMatches) {
    if matches.is_present("node") {
        let mut master = [0u8; 32];
        rand::rngs::OsRng {}.fill_bytes(&mut master);

        let keys = match NodeKeys::derive(&master) {
            Ok(keys) => keys,
            Err(e) => {
                eprintln!("dvoting keygen: {}", e);
                std::process::exit(1);
            }
        };

        println!("node-secret: {}", hex::encode(master));
        println!("bls-public-key: {}", hex::encode(&keys.signer.public_key().to_bytes()[..]));
        println!("ledger-public-key: {}", hex::encode(keys.client_public().to_bytes()));
        return;
    }

    let (secret, public) = dvoting::generate_keypair();
    let (secret, public) = (
        hex::encode(secret.to_bytes()),
        hex::encode(public.to_bytes()),
    );

    println!("secret-key: {}", secret);
    println!("public-key: {}", public);
}
