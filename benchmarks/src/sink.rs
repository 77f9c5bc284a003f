// Unless explicitly stated otherwise all files in this repository are licensed under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2024 Datadog, Inc.

//! Writes reports under an output directory, as JSON alongside HTML plots.
//!
//! ```text
//! <root>/distribution/<hash_bits>/<hash> with <mode> mode.{json,html}
//! <root>/collisions/<words_length>_bytes/<hash_bits>_bits_<test_bits>_window.{jsonl,html}
//! ```

use std::{
    collections::HashMap,
    fs::{self, create_dir_all, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use hashdist::{Checkpoint, CollisionReport, DistributionReport, Error, ReportSink};
use itertools::Itertools;
use plotly::{
    common::{ErrorData, ErrorType, Mode as LineMode, Title},
    layout::{Axis, AxisType},
    Bar, Layout, Plot, Scatter,
};
use tracing::info;

#[derive(Debug)]
pub struct FileSink {
    root: PathBuf,
    // Curves seen so far, per collision output file, so that each plot
    // overlays every hash function of the run.
    curves: HashMap<PathBuf, HashMap<String, Vec<Checkpoint>>>,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            curves: HashMap::new(),
        }
    }
}

impl ReportSink for FileSink {
    fn distribution(&mut self, report: &DistributionReport) -> Result<(), Error> {
        let dir = self
            .root
            .join("distribution")
            .join(report.hash_bits.to_string());
        create_dir_all(&dir).map_err(Error::sink)?;

        let stem = format!("{} with {} mode", report.hash_name, report.mode);
        let json_path = dir.join(format!("{stem}.json"));
        let mut output = BufWriter::new(File::create(&json_path).map_err(Error::sink)?);
        serde_json::to_writer_pretty(&mut output, report).map_err(Error::sink)?;
        output.flush().map_err(Error::sink)?;

        write_plot(&distribution_plot(report), &dir.join(format!("{stem}.html")))?;
        info!(path = %json_path.display(), "distribution report written");
        Ok(())
    }

    fn collisions(&mut self, report: &CollisionReport) -> Result<(), Error> {
        let dir = self
            .root
            .join("collisions")
            .join(format!("{}_bytes", report.words_length));
        create_dir_all(&dir).map_err(Error::sink)?;

        let stem = format!("{}_bits_{}_window", report.hash_bits, report.test_bits);
        let jsonl_path = dir.join(format!("{stem}.jsonl"));
        let mut output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&jsonl_path)
            .map_err(Error::sink)?;
        serde_json::to_writer(&mut output, report).map_err(Error::sink)?;
        output.write_all("\n".as_bytes()).map_err(Error::sink)?;
        output.flush().map_err(Error::sink)?;

        let curves = self.curves.entry(jsonl_path.clone()).or_default();
        curves.insert(report.hash_name.clone(), report.checkpoints.clone());
        write_plot(&collisions_plot(report, curves), &dir.join(format!("{stem}.html")))?;
        info!(path = %jsonl_path.display(), hash = %report.hash_name, "collision report written");
        Ok(())
    }
}

fn write_plot(plot: &Plot, path: &Path) -> Result<(), Error> {
    fs::write(path, plot.to_html()).map_err(Error::sink)
}

fn distribution_plot(report: &DistributionReport) -> Plot {
    let bars = &report.summary.bars;
    let mut plot = Plot::new();
    plot.add_trace(
        Bar::new(
            bars.iter().map(|bar| bar.x).collect(),
            bars.iter().map(|bar| bar.mean).collect(),
        )
        .name(&report.hash_name)
        .error_y(
            ErrorData::new(ErrorType::Data)
                .array(bars.iter().map(|bar| bar.err_max).collect())
                .array_minus(bars.iter().map(|bar| bar.err_min).collect())
                .symmetric(false),
        ),
    );
    let layout = Layout::new()
        .title(Title::new(&format!(
            "{} ({} mode, p = {:.3})",
            report.hash_name, report.mode, report.p_value
        )))
        .x_axis(Axis::new().title(Title::new("Bucket")))
        .y_axis(Axis::new().title(Title::new("Keys per bucket")));
    plot.set_layout(layout);
    plot
}

fn collisions_plot(report: &CollisionReport, curves: &HashMap<String, Vec<Checkpoint>>) -> Plot {
    let mut plot = Plot::new();
    curves
        .iter()
        .sorted_by_key(|&(hash, _)| hash)
        .map(|(hash, checkpoints)| {
            Scatter::new(
                checkpoints.iter().map(|c| c.samples).collect(),
                checkpoints.iter().map(|c| c.collisions).collect(),
            )
            .name(hash)
        })
        .for_each(|trace| plot.add_trace(trace));
    // All runs of a file share the same checkpoints.
    plot.add_trace(
        Scatter::new(
            report.checkpoints.iter().map(|c| c.samples).collect(),
            report
                .checkpoints
                .iter()
                .map(|c| c.expected_collisions)
                .collect(),
        )
        .mode(LineMode::Lines)
        .name("uniform"),
    );
    let layout = Layout::new()
        .title(Title::new(&format!(
            "Collisions in a {}-bit window of {}-bit hashes ({}-byte words)",
            report.test_bits, report.hash_bits, report.words_length
        )))
        .x_axis(
            Axis::new()
                .title(Title::new("Number of hashed words"))
                .type_(AxisType::Log),
        )
        .y_axis(
            Axis::new()
                .title(Title::new("Number of collisions"))
                .type_(AxisType::Log),
        );
    plot.set_layout(layout);
    plot
}
