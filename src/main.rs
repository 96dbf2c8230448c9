use clap::{arg,crate_version,Command};
use prunelzw::lzw;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &str) -> bool {
    if let Ok(_f) = std::fs::File::open(path_out) {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out);
        std::io::stdin().read_line(&mut ans).expect("could not read stdin");
        if ans.trim_end()=="y" || ans.trim_end()=="Y" {
            log::warn!("existing file will not be truncated");
            return true;
        }
        return false;
    }
    true
}

/// widths outside (8,20] fall back to 12, anything non-numeric or non-positive is an error
fn resolve_max_bits(arg: Option<&String>) -> Result<usize,Box<dyn std::error::Error>> {
    let val = match arg {
        Some(s) => match s.parse::<i64>() {
            Ok(v) if v > 0 => v,
            _ => {
                eprintln!("invalid --max-bits value");
                return Err(Box::new(prunelzw::Error::InvalidConfig));
            }
        },
        None => return Ok(12)
    };
    if val <= 8 || val > 20 {
        log::warn!("--max-bits {} out of range, using 12",val);
        Ok(12)
    } else {
        Ok(val as usize)
    }
}

fn resolve_prune(arg: Option<&String>) -> Result<usize,Box<dyn std::error::Error>> {
    match arg {
        Some(s) => match s.parse::<i64>() {
            Ok(v) if v > 0 => Ok(v as usize),
            _ => {
                eprintln!("invalid --prune value");
                Err(Box::new(prunelzw::Error::InvalidConfig))
            }
        },
        None => Ok(0)
    }
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Compress:      `prunelzw compress -i my_expanded -o my_compressed -m 12 -p 3`
Expand:        `prunelzw expand -i my_compressed -o my_expanded`
Share a dictionary between runs with `--snapshot` and `--seed`.";

    let mut main_cmd = Command::new("prunelzw")
        .about("Compress and expand with pruning LZW")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-m --"max-bits" <BITS> "maximum code width in bits, 9-20"))
        .arg(arg!(-p --prune <COUNT> "evict entries used fewer than COUNT times"))
        .arg(arg!(--seed <PATH> "prime the dictionary from this snapshot"))
        .arg(arg!(--snapshot <PATH> "write the final dictionary snapshot here"))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(--snapshot <PATH> "write the final dictionary snapshot here"))
        .about("expand a file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let opt = lzw::Options {
            max_code_bits: resolve_max_bits(cmd.get_one::<String>("max-bits"))?,
            prune_threshold: resolve_prune(cmd.get_one::<String>("prune"))?,
            seed_in: cmd.get_one::<String>("seed").cloned(),
            snapshot_out: cmd.get_one::<String>("snapshot").cloned()
        };
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = lzw::compress(&mut in_file,&mut out_file,&opt)?;
        out_file.set_len(out_size)?;
        eprintln!("compressed {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let snapshot = cmd.get_one::<String>("snapshot").cloned();
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = lzw::expand(&mut in_file,&mut out_file,snapshot.as_deref())?;
        out_file.set_len(out_size)?;
        eprintln!("expanded {} into {}",in_size,out_size);
    }

    Ok(())
}
