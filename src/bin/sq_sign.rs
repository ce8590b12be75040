//! A thin command-line front-end exercising the sign, clearsign and
//! export drivers end to end. It resolves keys from a toy in-memory
//! keyring, not a real keyring format -- wiring one up is outside this
//! crate's scope.

use std::fs::File;
use std::io::{self, Read};

use anyhow::{Context, Result};
use clap::{App, Arg, SubCommand};

use pgp_sign_core::config::Options;
use pgp_sign_core::export::{self, MemoryKeyring};
use pgp_sign_core::iobuf::IOBuf;
use pgp_sign_core::keys::{KeyList, MemoryKeyStore, SecretKeyStore};
use pgp_sign_core::signature::{PubkeyBackend, SecretKey};
use pgp_sign_core::types::{HashAlgorithm, PublicKeyAlgorithm};
use pgp_sign_core::{clearsign, sign};

/// A pass-through "signer" that just emits the encoded digest as a
/// single-element MPI sequence. There is no real cryptography behind
/// this binary; wiring in `rsa`/`dsa` (or a PKCS#11 token) is a
/// deployment concern, not something this core crate opinionates on.
struct DemoBackend;

impl PubkeyBackend for DemoBackend {
    fn encode_md_value(
        &self,
        _pubkey_algo: PublicKeyAlgorithm,
        digest: &[u8],
        _digest_algo: HashAlgorithm,
        _nbits: usize,
    ) -> pgp_sign_core::Result<Vec<u8>> {
        Ok(digest.to_vec())
    }

    fn pubkey_sign(
        &self,
        _pubkey_algo: PublicKeyAlgorithm,
        encoded: &[u8],
        _sk: &SecretKey,
    ) -> pgp_sign_core::Result<Vec<Vec<u8>>> {
        Ok(vec![encoded.to_vec()])
    }
}

fn demo_keystore() -> MemoryKeyStore {
    MemoryKeyStore::new(vec![SecretKey {
        keyid: 0xDEAD_BEEF_0000_0001,
        version: 4,
        pubkey_algo: PublicKeyAlgorithm::RSA,
        skey: vec![vec![0x01, 0x00]],
    }])
}

fn build_cli() -> App<'static, 'static> {
    let local_user = Arg::with_name("local-user")
        .long("local-user")
        .short("u")
        .value_name("KEYID")
        .multiple(true)
        .number_of_values(1)
        .help("Selects a signing key by key ID (may be given more than once)");
    let armor = Arg::with_name("armor").long("armor").short("a").help("Wrap output in ASCII armor");
    let textmode = Arg::with_name("textmode").long("textmode").short("t").help("Sign in canonical text mode");
    let output = Arg::with_name("output").long("output").short("o").value_name("FILE").help("Writes output to FILE");
    let input = Arg::with_name("input").value_name("FILE").help("Input file; omit or pass \"-\" for stdin");

    App::new("sq-sign")
        .version("0.1.0")
        .about("Signs, clearsigns and exports OpenPGP material")
        .subcommand(
            SubCommand::with_name("sign")
                .about("Creates a signature, embedded or detached")
                .arg(local_user.clone())
                .arg(armor.clone())
                .arg(textmode.clone())
                .arg(output.clone())
                .arg(Arg::with_name("detach-sign").long("detach-sign").short("b").help("Produce a detached signature"))
                .arg(input.clone()),
        )
        .subcommand(
            SubCommand::with_name("clearsign")
                .about("Creates a cleartext signature")
                .arg(local_user.clone())
                .arg(output.clone())
                .arg(input.clone()),
        )
        .subcommand(
            SubCommand::with_name("export")
                .about("Exports public keys from the demo keyring")
                .arg(armor.clone())
                .arg(output.clone())
                .arg(Arg::with_name("selector").multiple(true).help("User IDs to export; omit to export all")),
        )
}

fn open_input(path: &str) -> Result<Box<dyn Read>> {
    if path == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(File::open(path).with_context(|| format!("opening {path}"))?))
    }
}

fn open_output(path: Option<&str>) -> Result<IOBuf> {
    match path {
        Some(p) => Ok(IOBuf::create(p)?),
        None => Ok(IOBuf::wrap(io::stdout())),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        ("sign", Some(m)) => {
            let store = demo_keystore();
            let selectors: Vec<String> = m.values_of("local-user").map(|v| v.map(String::from).collect()).unwrap_or_default();
            let keys: KeyList = store.build_sk_list(&selectors)?;

            let mut opts = Options::new();
            opts.armor = m.is_present("armor");
            opts.textmode = m.is_present("textmode");

            let explicit_outfile = m.value_of("output").is_some();
            let mut input = open_input(m.value_of("input").unwrap_or("-"))?;
            let out = open_output(m.value_of("output"))?;

            if m.is_present("detach-sign") {
                sign::sign_detached_single(&mut input, out, &keys, &opts, &DemoBackend, now(), explicit_outfile)?;
            } else {
                let name = match m.value_of("input") {
                    Some(p) if p != "-" => p.as_bytes().to_vec(),
                    _ => Vec::new(),
                };
                sign::sign_embedded(&mut input, out, &keys, &opts, &DemoBackend, &name, now(), explicit_outfile)?;
            }
        }
        ("clearsign", Some(m)) => {
            let store = demo_keystore();
            let selectors: Vec<String> = m.values_of("local-user").map(|v| v.map(String::from).collect()).unwrap_or_default();
            let keys = store.build_sk_list(&selectors)?;
            let opts = Options::new();
            let mut input = open_input(m.value_of("input").unwrap_or("-"))?;
            let out = open_output(m.value_of("output"))?;
            clearsign::clearsign(&mut input, out, &keys, &opts, &DemoBackend, now())?;
        }
        ("export", Some(m)) => {
            let keyring = MemoryKeyring::new();
            let selectors: Vec<String> = m.values_of("selector").map(|v| v.map(String::from).collect()).unwrap_or_default();
            let mut opts = Options::new();
            opts.armor = m.is_present("armor");
            let out = open_output(m.value_of("output"))?;
            export::export(out, &selectors, false, &keyring, &opts)?;
        }
        _ => {
            build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}

fn now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
