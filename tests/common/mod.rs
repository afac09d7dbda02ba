#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use filing_anchors::PipelineConfig;
use flate2::write::GzEncoder;
use flate2::Compression;

pub const ARCHIVE_NAME: &str = "20231103.nc.tar.gz";
pub const MEMBER: &str = "0000320193-23-000106.nc";

/// Annual report, a graphic and an XBRL instance, in that order.
pub const SUBMISSION: &str = "\
<SEC-HEADER>
ACCESSION NUMBER: 0000320193-23-000106
</SEC-HEADER>
<DOCUMENT>
<TYPE>10-K
<SEQUENCE>1
<FILENAME>aapl-20230930.htm
<TEXT>
<html><body>
<h2>RISK FACTORS</h2>
<p>The Company&#8217;s operations are subject to risk. Prices may rise in 2024. Costs may fall.</p>
<p>\"Net Sales\" means revenue net of returns.</p>
<table>
<tr><th></th><th>2023</th><th>2022</th></tr>
<tr><td>Revenue</td><td>383,285</td><td>394,328</td></tr>
<tr><td>Cost of sales</td><td>214,137</td><td>223,546</td></tr>
</table>
<p>See Note 4.2 for details.</p>
</body></html>
</TEXT>
</DOCUMENT>
<DOCUMENT>
<TYPE>GRAPHIC
<SEQUENCE>2
<FILENAME>logo.jpg
<TEXT>
begin 644 logo.jpg
M_]C_X  02D9)1@ ! 0$ 8 !@  #_VP!#  @&!@<&!0@'!P<)\"0@*# 4-# L+
end
</TEXT>
</DOCUMENT>
<DOCUMENT>
<TYPE>EX-101.INS
<SEQUENCE>3
<FILENAME>aapl-20230930_htm.xml
<TEXT>
<?xml version=\"1.0\" encoding=\"utf-8\"?>
<xbrl xmlns=\"http://www.xbrl.org/2003/instance\"></xbrl>
</TEXT>
</DOCUMENT>
";

/// Write a gzip tar holding `members` (name, body) into `dir`.
pub fn write_archive(dir: &Path, members: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(ARCHIVE_NAME);
    let file = File::create(&path).expect("create archive");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::fast()));
    for (name, body) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("20231103/{name}"), body.as_bytes())
            .expect("append member");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
    path
}

pub fn config_for(archive: &Path, out_dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.run.archive = Some(archive.to_path_buf());
    config.run.output_dir = out_dir.to_path_buf();
    config
}
