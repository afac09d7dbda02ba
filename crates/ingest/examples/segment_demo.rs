use ingest::{ingest_member, BinarySegmentFilter, FilteredSegment, IngestConfig, TarSegmentReader};

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(archive) = args.next() else {
        eprintln!("usage: segment_demo <archive.nc.tar.gz> [member]");
        std::process::exit(2);
    };

    let reader = TarSegmentReader::open(&archive, &IngestConfig::default())
        .expect("archive should open");
    let members: Vec<String> = match args.next() {
        Some(member) => vec![member],
        None => reader.members().map(str::to_string).collect(),
    };

    for member in &members {
        let segments =
            ingest_member(&reader, member, &BinarySegmentFilter).expect("member should read");
        for item in segments {
            match item {
                FilteredSegment::Keep(segment) => println!(
                    "keep {} type={} bytes={} tables={}",
                    segment.key(),
                    segment.header.get("type").map(String::as_str).unwrap_or("?"),
                    segment.html.len(),
                    segment.has_table
                ),
                FilteredSegment::Skip { segment, reason } => {
                    println!("skip {} ({reason})", segment.key())
                }
            }
        }
    }
}
