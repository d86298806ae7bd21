use std::io::Read;
use std::path::PathBuf;
use std::process::exit;

use slisp::{Interp, LispResult};

const HELP: &str = "\
slisp - a small interpreted Lisp

USAGE:
  slisp [OPTIONS] [FILE]

ARGS:
  <FILE>              program to run; stdin when omitted

OPTIONS:
  --stdlib <PATH>     standard library file (default: std.lisp)
  -h, --help          print this help
";

const DEFAULT_STDLIB: &str = "std.lisp";

fn main() {
    env_logger::init();

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return;
    }

    let stdlib: PathBuf = match args.opt_value_from_str("--stdlib") {
        Ok(path) => path.unwrap_or_else(|| PathBuf::from(DEFAULT_STDLIB)),
        Err(e) => {
            eprintln!("error: {}", e);
            exit(1);
        }
    };
    let program: Option<PathBuf> = match args.opt_free_from_str() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            exit(1);
        }
    };
    let rest = args.finish();
    if !rest.is_empty() {
        eprintln!("error: unexpected arguments: {:?}", rest);
        exit(1);
    }

    let mut interp = Interp::new();

    // The standard library is part of the language surface: refusing to
    // start without it beats silently running a crippled interpreter.
    let stdlib_src = match std::fs::read_to_string(&stdlib) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("can't open stdlib {}: {}", stdlib.display(), e);
            exit(1);
        }
    };
    if let Err(e) = run_source(&mut interp, &stdlib_src) {
        eprintln!("error in stdlib {}: {}", stdlib.display(), e);
        exit(1);
    }

    let source = match program {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("can't open {}: {}", path.display(), e);
                exit(1);
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("can't read stdin: {}", e);
                exit(1);
            }
            buf
        }
    };

    if let Err(e) = run_source(&mut interp, &source) {
        eprintln!("error: {}", e);
        exit(1);
    }
}

/// Evaluate a whole source text. `eval_str` already reads one
/// expression at a time, so an early expression's effects (defmacro in
/// particular) are in place before later text is even parsed. Results
/// are not echoed; only `print` prints.
fn run_source(interp: &mut Interp, source: &str) -> LispResult<()> {
    interp.eval_str(source)?;
    Ok(())
}
