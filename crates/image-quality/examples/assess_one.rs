use std::path::PathBuf;
use image_quality::{QualityAnalyzer, QualitySettings};

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: assess_one <image>"))?;

    let analyzer = QualityAnalyzer::new(QualitySettings::default());
    let report = analyzer.analyze_image(&path)?;

    println!("{} -> {} ({:.1})", path.display(), report.label, report.final_quality);
    for line in report.trace_lines() {
        println!("  {}", line);
    }
    Ok(())
}
