//! FileSink - writes driver products to disk, one folder per topic

use contracts::{ContractError, DataSink, DriverMessage, Image, PointCloud};
use image::{ImageBuffer, Luma};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

/// Sink that writes each product to `{base_path}/{topic}/{seq:06}.{ext}`
///
/// Images become 16-bit grayscale PNG, point clouds binary PLY and IMU
/// messages JSON.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    created_dirs: HashSet<PathBuf>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            created_dirs: HashSet::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::new(name, config)
    }

    fn topic_dir(&mut self, topic: &str) -> std::io::Result<PathBuf> {
        let dir = self.config.base_path.join(topic);
        if !self.created_dirs.contains(&dir) {
            fs::create_dir_all(&dir)?;
            self.created_dirs.insert(dir.clone());
        }
        Ok(dir)
    }

    fn write_message(&mut self, message: &DriverMessage) -> std::io::Result<PathBuf> {
        let dir = self.topic_dir(message.topic().as_str())?;
        let seq = message.header().seq;

        match message {
            DriverMessage::RangeImage(img) => {
                let path = dir.join(format!("{seq:06}.png"));
                // PNG pixels are 16 bit, ranges beyond ~65 m saturate
                save_gray16(&path, img, |mm| mm.min(u16::MAX as u32) as u16)?;
                Ok(path)
            }
            DriverMessage::IntensityImage(img) | DriverMessage::NoiseImage(img) => {
                let path = dir.join(format!("{seq:06}.png"));
                save_gray16(&path, img, |v| v)?;
                Ok(path)
            }
            DriverMessage::Points(cloud) => {
                let path = dir.join(format!("{seq:06}.ply"));
                save_point_cloud(&path, cloud)?;
                Ok(path)
            }
            DriverMessage::Imu(imu) => {
                let path = dir.join(format!("{seq:06}.json"));
                let file = File::create(&path)?;
                serde_json::to_writer(file, imu.as_ref())
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                Ok(path)
            }
        }
    }

    fn persist(&mut self, message: &DriverMessage) -> Result<(), ContractError> {
        match self.write_message(message) {
            Ok(path) => {
                debug!(sink = %self.name, path = %path.display(), "written");
                Ok(())
            }
            Err(e) => {
                error!(
                    sink = %self.name,
                    topic = %message.topic(),
                    seq = message.header().seq,
                    error = %e,
                    "Write failed"
                );
                Err(ContractError::sink_write(&self.name, e.to_string()))
            }
        }
    }
}

fn save_gray16<T: Copy>(
    path: &Path,
    image: &Image<T>,
    to_pixel: impl Fn(T) -> u16,
) -> std::io::Result<()> {
    let width = u32::try_from(image.width).map_err(std::io::Error::other)?;
    let height = u32::try_from(image.height).map_err(std::io::Error::other)?;
    let pixels: Vec<u16> = image.data.iter().map(|&v| to_pixel(v)).collect();

    let buffer: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_raw(width, height, pixels)
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "image data does not match its dimensions",
            )
        })?;
    buffer.save(path).map_err(std::io::Error::other)
}

fn save_point_cloud(path: &Path, cloud: &PointCloud) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "ply")?;
    writeln!(file, "format binary_little_endian 1.0")?;
    writeln!(file, "comment organized {} x {}", cloud.height, cloud.width)?;
    writeln!(file, "element vertex {}", cloud.points.len())?;
    writeln!(file, "property float x")?;
    writeln!(file, "property float y")?;
    writeln!(file, "property float z")?;
    writeln!(file, "property float intensity")?;
    writeln!(file, "property uint range")?;
    writeln!(file, "property ushort ring")?;
    writeln!(file, "end_header")?;

    for p in &cloud.points {
        file.write_all(&p.x.to_le_bytes())?;
        file.write_all(&p.y.to_le_bytes())?;
        file.write_all(&p.z.to_le_bytes())?;
        file.write_all(&p.intensity.to_le_bytes())?;
        file.write_all(&p.range.to_le_bytes())?;
        file.write_all(&p.ring.to_le_bytes())?;
    }
    file.flush()
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, message),
        fields(sink = %self.name, topic = %message.topic(), seq = message.header().seq)
    )]
    async fn write(&mut self, message: &DriverMessage) -> Result<(), ContractError> {
        self.persist(message)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
