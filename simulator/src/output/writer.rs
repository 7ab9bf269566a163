use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use compcore::interface::{Product, ProductSink, ReduceRequest};
use compcore::{ReduceError, ReduceResult};

use super::model::RunSummary;

/// Writes each product as JSON into one directory.
pub struct JsonProductSink {
    dir: PathBuf,
}

impl JsonProductSink {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    pub fn product_path(&self, product: &Product) -> PathBuf {
        self.dir.join(format!("{}.json", product.name))
    }

    pub fn write_summary(&self, summary: &RunSummary) -> anyhow::Result<PathBuf> {
        let path = self.dir.join("summary.json");
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), summary)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

impl ProductSink for JsonProductSink {
    fn write(&self, _request: &ReduceRequest, product: &Product) -> ReduceResult<()> {
        let path = self.product_path(product);
        let file = File::create(&path)
            .map_err(|err| ReduceError::Output(format!("creating {}: {err}", path.display())))?;
        serde_json::to_writer(BufWriter::new(file), product)
            .map_err(|err| ReduceError::Output(format!("writing {}: {err}", path.display())))?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compcore::interface::product::{CORRECTED_VELOCITY, STOKES_Q};
    use compcore::interface::{AveragingMethod, Header, ProductExtension};
    use compcore::WaveType;
    use ndarray::{array, Array2};
    use tempfile::tempdir;

    fn request() -> ReduceRequest {
        ReduceRequest {
            date: "20150624".into(),
            wave_type: WaveType::Fe1079,
            method: AveragingMethod::Mean,
            synoptic: false,
            synthetic: false,
        }
    }

    #[test]
    fn product_lands_under_its_name() {
        let dir = tempdir().unwrap();
        let sink = JsonProductSink::new(dir.path().join("out")).unwrap();
        let request = request();
        let product = Product {
            name: request.output_name(),
            primary: Header::new(),
            extensions: Vec::new(),
        };
        sink.write(&request, &product).unwrap();

        let path = sink.product_path(&product);
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["name"], "20150624.comp.1079.quick_invert.mean.waves.fts");

        let summary_path = sink.write_summary(&RunSummary::default()).unwrap();
        assert!(summary_path.exists());
    }

    #[test]
    fn written_product_reads_back_with_nan_pixels() {
        let dir = tempdir().unwrap();
        let sink = JsonProductSink::new(dir.path()).unwrap();
        let request = request();
        let product = Product {
            name: request.output_name(),
            primary: Header::new(),
            extensions: vec![
                ProductExtension::new(CORRECTED_VELOCITY, array![[1.25, f32::NAN], [-0.5, 3.0]]),
                ProductExtension::new(STOKES_Q, Array2::from_elem((2, 2), f32::NAN)),
            ],
        };
        sink.write(&request, &product).unwrap();

        let text = fs::read_to_string(sink.product_path(&product)).unwrap();
        let back: Product = serde_json::from_str(&text).unwrap();
        assert_eq!(back.name, product.name);
        assert_eq!(back.extension_names(), product.extension_names());

        let velocity = &back.extensions[0];
        assert_eq!(velocity.data[[0, 0]], 1.25);
        assert!(velocity.data[[0, 1]].is_nan());
        assert_eq!(velocity.data[[1, 0]], -0.5);
        assert_eq!(velocity.header.get_f64("DATAMIN"), Some(-0.5));
        assert_eq!(velocity.header.get_f64("DATAMAX"), Some(3.0));

        let q = &back.extensions[1];
        assert!(q.data.iter().all(|v| v.is_nan()));
        assert!(q.header.get_f64("DATAMIN").unwrap().is_nan());
    }
}
