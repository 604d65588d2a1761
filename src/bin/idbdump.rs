//! `idbdump`: inspect database files from the command line.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

use idbdump::btree::Rel;
use idbdump::entity::{Bitfield, Enum, List, Script, Struct};
use idbdump::id0::Id0;
use idbdump::id1::Id1;
use idbdump::nam::Nam;
use idbdump::nodekey::{
    make_name_key_name, make_node_key, make_node_key_tag, make_node_key_tag_hash,
    make_node_key_tag_index,
};
use idbdump::Database;

/// Inspect a proprietary interactive-disassembler database file.
#[derive(Parser, Debug)]
#[command(name = "idbdump", version, about)]
struct Args {
    /// Database files to inspect.
    files: Vec<PathBuf>,

    /// Print loader, CPU, versions, timestamps, license info.
    #[arg(short, long)]
    info: bool,

    /// Dump all entries in "$ scriptsnippets".
    #[arg(short, long)]
    scripts: bool,

    /// Dump "$ structs".
    #[arg(short = 't', long)]
    structs: bool,

    /// Dump "$ enums" (including bitfields).
    #[arg(short, long)]
    enums: bool,

    /// Print defined names (skip auto-generated unless -a).
    #[arg(short, long)]
    names: bool,

    /// Include auto-generated names (only meaningful with --names).
    #[arg(short = 'a')]
    all_names: bool,

    /// Low-level dump of every key/value.
    #[arg(short = 'd', long = "id0")]
    id0: bool,

    /// Iterate all records ascending.
    #[arg(long)]
    inc: bool,

    /// Iterate all records descending.
    #[arg(long)]
    dec: bool,

    /// Execute a query (see the grammar in the manual).
    #[arg(short, long)]
    query: Option<String>,

    /// Limit iteration output to N records.
    #[arg(short = 'm', long = "limit")]
    limit: Option<i64>,

    /// Addresses to resolve, after a literal `--`.
    #[arg(last = true)]
    addrs: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if args.files.is_empty() {
        eprintln!("idbdump: at least one database file is required");
        return ExitCode::FAILURE;
    }

    let mut any_failed = false;
    for path in &args.files {
        if let Err(e) = process_file(path, &args) {
            eprintln!("{}: {e:#}", path.display());
            any_failed = true;
        }
    }

    if any_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[instrument(skip(args), fields(path = %path.display()))]
fn process_file(path: &Path, args: &Args) -> anyhow::Result<()> {
    info!("processing file");
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let db = Database::open(file)?;
    let id0 = db.id0()?;

    if args.info {
        dump_info(&id0)?;
    }
    if args.scripts {
        dump_scripts(&id0)?;
    }
    if args.structs {
        dump_structs(&id0)?;
    }
    if args.enums {
        dump_enums(&id0)?;
    }
    if args.names {
        let mut id1 = db
            .id1()?
            .ok_or_else(|| anyhow!("database has no ID1 (flag map) section"))?;
        let mut nam = db
            .nam()?
            .ok_or_else(|| anyhow!("database has no NAM (name index) section"))?;
        dump_names(&id0, &mut id1, &mut nam, args.all_names)?;
    }
    if !args.addrs.is_empty() {
        let id1 = db
            .id1()?
            .ok_or_else(|| anyhow!("database has no ID1 (flag map) section"))?;
        let mut nam = db
            .nam()?
            .ok_or_else(|| anyhow!("database has no NAM (name index) section"))?;
        let addrs = args
            .addrs
            .iter()
            .map(|s| parse_unsigned(s))
            .collect::<anyhow::Result<Vec<_>>>()?;
        dump_addrs(&id0, &id1, &mut nam, &addrs)?;
    }

    if let Some(query) = &args.query {
        run_query(&id0, query, !args.dec, args.limit)?;
    } else if args.inc || args.dec {
        dump_nodes(&id0, args.inc, args.limit)?;
    }

    if args.id0 {
        dump_id0_raw(&id0)?;
    }

    Ok(())
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Render bytes as printable ASCII verbatim, everything else as a `\xHH`
/// escape (mirrors this format's conventional `%b` printf verb).
fn fmt_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_graphic() || b == b' ' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{b:02x}"));
        }
    }
    out
}

fn parse_unsigned(s: &str) -> anyhow::Result<u64> {
    let (neg, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)?
    } else {
        s.parse::<u64>()?
    };
    Ok(if neg {
        (value as i64).wrapping_neg() as u64
    } else {
        value
    })
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

fn timestring(t: u64) -> String {
    if t == 0 {
        return " ".repeat(16);
    }
    let secs = t as i64;
    let days = secs.div_euclid(86400);
    let tod = secs.rem_euclid(86400);
    let (y, m, d) = civil_from_days(days);
    let h = tod / 3600;
    let mi = (tod % 3600) / 60;
    format!("{y:04}-{m:02}-{d:02} {h:02}:{mi:02}")
}

fn dump_info<R: Read + Seek>(id0: &Id0<R>) -> anyhow::Result<()> {
    let loadernode = id0.node(b"$ loader name")?;
    println!(
        "loader: {}  {}",
        lossy(&id0.getstr(loadernode, b'S', 0)?),
        lossy(&id0.getstr(loadernode, b'S', 1)?)
    );

    let rootnode = id0.node(b"Root Node")?;
    let params = id0.getdata(rootnode, b'S', 0x41b994)?;
    let cpu = if params.len() >= 13 {
        let raw = &params[5..13];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        lossy(&raw[..end])
    } else {
        String::new()
    };
    println!(
        "cpu: {cpu:<8},  idaversion={:04}: {}",
        id0.getuint(rootnode, b'A', -1)?,
        lossy(&id0.getstr(rootnode, b'S', 1303)?)
    );
    println!(
        "nopens={}, ctime={}, crc={:08x}, binary md5={}",
        id0.getuint(rootnode, b'A', -4)?,
        timestring(id0.getuint(rootnode, b'A', -2)?),
        id0.getuint(rootnode, b'A', -5)?,
        fmt_bytes(&id0.getdata(rootnode, b'S', 1302)?)
    );

    let original_user = id0.getdata(id0.node(b"$ original user")?, b'S', 0)?;
    let user1 = id0.getdata(id0.node(b"$ user1")?, b'S', 0)?;
    if !original_user.is_empty() || !user1.is_empty() {
        println!(
            "license: orig metadata {} bytes, curr metadata {} bytes (decryption out of scope)",
            original_user.len(),
            user1.len()
        );
    }
    Ok(())
}

fn dump_scripts<R: Read + Seek>(id0: &Id0<R>) -> anyhow::Result<()> {
    let nodeid = id0.node(b"$ scriptsnippets")?;
    let mut list = List::open(id0, nodeid, |id| Ok(Script::new(id)))?;
    while !list.eof() {
        let scr = list.next()?;
        println!(
            "======= {} {} =======\n{}",
            lossy(&scr.language(id0)?),
            lossy(&scr.name(id0)?),
            lossy(&scr.body(id0)?)
        );
    }
    Ok(())
}

fn dump_struct_member<R: Read + Seek>(id0: &Id0<R>, mem: &idbdump::entity::StructMember) -> anyhow::Result<()> {
    let mut line = format!(
        "     {:02x} {:02x} {:08x} {:02x}: {:<40}",
        mem.skip(),
        mem.size(),
        mem.flags(),
        mem.props(),
        lossy(&mem.name(id0)?)
    );
    let enumid = mem.enumid(id0)?;
    if enumid != 0 {
        line.push_str(&format!(" enum {enumid:08x}"));
    }
    let structid = mem.structid(id0)?;
    if structid != 0 {
        line.push_str(&format!(" struct {structid:08x}"));
    }
    let ptrinfo = mem.ptrinfo(id0)?;
    if !ptrinfo.is_empty() {
        line.push_str(&format!(" ptr {}", fmt_bytes(&ptrinfo)));
    }
    let typeinfo = mem.typeinfo(id0)?;
    if !typeinfo.is_empty() {
        line.push_str(&format!(" type {}", fmt_bytes(&typeinfo)));
    }
    println!("{line}");
    Ok(())
}

fn dump_structs<R: Read + Seek>(id0: &Id0<R>) -> anyhow::Result<()> {
    let nodeid = id0.node(b"$ structs")?;
    let mut list = List::open(id0, nodeid, |id| Struct::open(id0, id))?;
    while !list.eof() {
        let s = match list.next() {
            Ok(s) => s,
            Err(_) => {
                println!("struct entry with error found");
                continue;
            }
        };
        println!("struct {}, 0x{:x}, 0x{:x}", lossy(&s.name(id0)?), s.flags(), s.seqnr());
        for mem in s.members() {
            dump_struct_member(id0, mem)?;
        }
    }
    Ok(())
}

fn dump_bitfield<R: Read + Seek>(id0: &Id0<R>, nodeid: u64) -> anyhow::Result<()> {
    let bf = Bitfield::new(nodeid);
    println!(
        "bitfield {}, 0x{:x}, 0x{:x}, 0x{:x}",
        lossy(&bf.name(id0)?),
        bf.count(id0)?,
        bf.representation(id0)?,
        bf.flags(id0)?
    );
    let mut cursor = bf.first(id0)?;
    let lastkey = bf.lastkey(id0);
    while cursor.getkey()? < lastkey {
        let mask = bf.getmask(id0, &cursor)?;
        print!("    mask {:x}", mask.mask());
        let name = mask.name(id0)?;
        if !name.is_empty() {
            print!(" - {}", lossy(&name));
        }
        println!();
        let mut vcursor = mask.first(id0)?;
        let vlastkey = mask.lastkey(id0);
        while vcursor.getkey()? < vlastkey {
            let val = mask.getvalue(id0, &vcursor)?;
            println!("   {:16x} {}", val.value(), lossy(&val.name(id0)?));
            vcursor.next()?;
        }
        cursor.next()?;
    }
    Ok(())
}

fn dump_enums<R: Read + Seek>(id0: &Id0<R>) -> anyhow::Result<()> {
    let nodeid = id0.node(b"$ enums")?;
    let mut list = List::open(id0, nodeid, |id| Ok(Enum::new(id)))?;
    while !list.eof() {
        let e = list.next()?;
        if e.is_bitfield(id0)? {
            dump_bitfield(id0, e.nodeid())?;
            continue;
        }
        println!(
            "enum {}, 0x{:x}, 0x{:x}, 0x{:x}",
            lossy(&e.name(id0)?),
            e.count(id0)?,
            e.representation(id0)?,
            e.flags(id0)?
        );
        let mut cursor = e.first(id0)?;
        let lastkey = e.lastkey(id0);
        while cursor.getkey()? < lastkey {
            let m = e.getvalue(id0, &cursor)?;
            println!("    {:08x} {}", m.value(), lossy(&m.name(id0)?));
            cursor.next()?;
        }
    }
    Ok(())
}

fn dump_names<R: Read + Seek>(
    id0: &Id0<R>,
    id1: &mut Id1<R>,
    nam: &mut Nam<R>,
    listall: bool,
) -> anyhow::Result<()> {
    for ea in nam.enumerate()? {
        let f = id1.get_flags(ea)?;
        let name = id0.getname(ea)?;
        if listall || f & 0x8000 == 0 {
            println!("{ea:08x}: [{f:08x}] {}", lossy(&name));
        }
    }
    Ok(())
}

fn dump_addrs<R: Read + Seek>(
    id0: &Id0<R>,
    id1: &Id1<R>,
    nam: &mut Nam<R>,
    addrs: &[u64],
) -> anyhow::Result<()> {
    for &ea in addrs {
        let seg0 = id1.seg_start(ea);
        let seg1 = id1.seg_end(ea);

        let segspec = match (seg0, seg1) {
            (Some(s0), _) if s0 == ea => format!("seg:{s0:08x} start"),
            (Some(s0), Some(s1)) if s1 == ea => format!("seg:{s0:08x} end"),
            (Some(s0), _) => format!("seg:{s0:08x}+0x{:x}", ea - s0),
            (None, _) => "not in a seg".to_string(),
        };

        let namespec = match nam.findname(ea)? {
            None => "-".to_string(),
            Some(fea) => {
                let name = lossy(&id0.getname(fea)?);
                match fea.cmp(&ea) {
                    std::cmp::Ordering::Equal => name,
                    std::cmp::Ordering::Less => format!("{name}+0x{:x}", ea - fea),
                    std::cmp::Ordering::Greater => format!("{name}-0x{:x}", fea - ea),
                }
            }
        };

        println!("{ea:08x}: {segspec:<23} {namespec}");
    }
    Ok(())
}

fn dump_nodes<R: Read + Seek>(id0: &Id0<R>, ascending: bool, limit: Option<i64>) -> anyhow::Result<()> {
    let mut cursor = if ascending {
        id0.find(Rel::GreaterEqual, &[])?
    } else {
        id0.find(Rel::LessEqual, &[0xFF, 0xFF, 0xFF, 0xFF])?
    };
    let mut remaining = limit.unwrap_or(-1);
    while !cursor.eof() && remaining != 0 {
        println!("{} = {}", fmt_bytes(&cursor.getkey()?), fmt_bytes(&cursor.getval()?));
        if ascending {
            cursor.next()?;
        } else {
            cursor.prev()?;
        }
        if remaining > 0 {
            remaining -= 1;
        }
    }
    Ok(())
}

fn dump_id0_raw<R: Read + Seek>(id0: &Id0<R>) -> anyhow::Result<()> {
    dump_nodes(id0, true, None)
}

fn xlat_relation(eq: bool, gt: bool, lt: bool) -> anyhow::Result<Rel> {
    match (eq, gt, lt) {
        (true, true, false) => Ok(Rel::GreaterEqual),
        (false, true, false) => Ok(Rel::Greater),
        (true, false, true) => Ok(Rel::LessEqual),
        (false, false, true) => Ok(Rel::Less),
        (true, false, false) | (false, false, false) => Ok(Rel::Equal),
        _ => Err(anyhow!("invalid keyspec: contradictory relation")),
    }
}

/// `query[0]` and `query[1]` are independently checked for `{=,<,>}`; the key
/// starts at the first position that didn't match either, or `query[2]`.
fn split_relation(query: &str) -> (Rel, &str) {
    let bytes = query.as_bytes();
    let mut eq = false;
    let mut gt = false;
    let mut lt = false;
    let mut key_start = None;

    match bytes[0] {
        b'=' => eq = true,
        b'>' => gt = true,
        b'<' => lt = true,
        _ => key_start = Some(0),
    }
    match bytes[1] {
        b'=' => eq = true,
        b'>' => gt = true,
        b'<' => lt = true,
        _ => {
            key_start.get_or_insert(1);
        }
    }
    let key_start = key_start.unwrap_or(2);

    let rel = xlat_relation(eq, gt, lt).unwrap_or(Rel::Equal);
    (rel, &query[key_start..])
}

/// `.<nodeid>[;tag[;idx]]`, `?<name>`, `#<nodeid>[;tag[;idx]]`, or
/// `<name>[;tag[;idx]]`.
fn create_key<R: Read + Seek>(id0: &Id0<R>, key: &str) -> anyhow::Result<Vec<u8>> {
    if key.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(rest) = key.strip_prefix('?') {
        return Ok(make_name_key_name(rest.as_bytes()));
    }

    let mut parts = key.splitn(3, ';');
    let head = parts.next().unwrap();
    let tag_part = parts.next();
    let idx_part = parts.next();

    let nodeid = if let Some(rest) = head.strip_prefix('.') {
        parse_unsigned(rest).context("invalid keyspec: bad node id")?
    } else if let Some(rest) = head.strip_prefix('#') {
        parse_unsigned(rest).context("invalid keyspec: bad node id")? + id0.node_base()
    } else {
        id0.node(head.as_bytes())?
    };

    let Some(tag_str) = tag_part else {
        return Ok(make_node_key(id0.word_size(), nodeid));
    };
    let tag = *tag_str
        .as_bytes()
        .first()
        .ok_or_else(|| anyhow!("invalid keyspec: empty tag"))?;

    let Some(idx_str) = idx_part else {
        return Ok(make_node_key_tag(id0.word_size(), nodeid, tag));
    };

    if tag == b'H' {
        Ok(make_node_key_tag_hash(id0.word_size(), nodeid, tag, idx_str.as_bytes()))
    } else {
        let idx = parse_unsigned(idx_str).context("invalid keyspec: bad index")?;
        Ok(make_node_key_tag_index(id0.word_size(), nodeid, tag, idx))
    }
}

fn run_query<R: Read + Seek>(
    id0: &Id0<R>,
    query: &str,
    ascending: bool,
    limit: Option<i64>,
) -> anyhow::Result<()> {
    if query.len() <= 2 {
        return Ok(());
    }
    let (rel, key_str) = split_relation(query);
    let key = create_key(id0, key_str)?;
    let mut cursor = id0.find(rel, &key)?;
    let mut remaining = limit.unwrap_or(-1);
    while !cursor.eof() && remaining != 0 {
        println!("{} = {}", fmt_bytes(&cursor.getkey()?), fmt_bytes(&cursor.getval()?));
        if rel == Rel::Equal {
            break;
        }
        if ascending {
            cursor.next()?;
        } else {
            cursor.prev()?;
        }
        if remaining > 0 {
            remaining -= 1;
        }
    }
    Ok(())
}
