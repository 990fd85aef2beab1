//! Concurrent delivery of tiles to their panels.

use std::collections::BTreeMap;
use std::thread;

use image::{imageops, DynamicImage, GrayImage};
use log::debug;

use polyptych_layout::Layout;

use crate::plan::{panel_tile, scale_to_layout, TileError};
use crate::transport::{PushOptions, Transport, TransportError};

/// Per-panel outcomes of a dispatch round.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: BTreeMap<String, Result<(), TransportError>>,
}

impl DispatchReport {
    pub fn all_ok(&self) -> bool {
        self.outcomes.values().all(Result::is_ok)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Scales the source against the layout, cuts one tile per panel and
/// delivers each tile on its own thread. A failing panel never blocks the
/// others; per-panel results land in the report.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(panels = layout.len()))
)]
pub fn send_layout_image(
    transport: &dyn Transport,
    layout: &Layout,
    image: &DynamicImage,
) -> Result<DispatchReport, TileError> {
    let source = scale_to_layout(image, layout)?;
    let tiles: Vec<(String, GrayImage)> = layout
        .values()
        .map(|p| (p.device_id.clone(), panel_tile(&source, p)))
        .collect();

    let mut report = DispatchReport::default();
    thread::scope(|scope| {
        let handles: Vec<_> = tiles
            .iter()
            .map(|(id, tile)| (id, scope.spawn(move || deliver(transport, id, tile))))
            .collect();
        for (id, handle) in handles {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(TransportError::Task("delivery thread panicked".into())));
            report.outcomes.insert(id.clone(), outcome);
        }
    });
    Ok(report)
}

/// Clears every panel in the layout concurrently.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(panels = layout.len()))
)]
pub fn clear_panels(transport: &dyn Transport, layout: &Layout) -> DispatchReport {
    let mut report = DispatchReport::default();
    thread::scope(|scope| {
        let handles: Vec<_> = layout
            .keys()
            .map(|id| (id, scope.spawn(move || transport.clear(id))))
            .collect();
        for (id, handle) in handles {
            let outcome = handle
                .join()
                .unwrap_or_else(|_| Err(TransportError::Task("clear thread panicked".into())));
            report.outcomes.insert(id.clone(), outcome);
        }
    });
    report
}

fn deliver(
    transport: &dyn Transport,
    device_id: &str,
    tile: &GrayImage,
) -> Result<(), TransportError> {
    let info = transport.query(device_id)?;
    if info.width == 0 || info.height == 0 {
        return Err(TransportError::Task(format!(
            "panel {device_id} reported zero resolution"
        )));
    }
    debug!(
        "panel {device_id} reports {}x{} ({}, {}°C), tile is {}x{}",
        info.width,
        info.height,
        info.screen_model,
        info.temperature,
        tile.width(),
        tile.height()
    );
    let fitted = fit_to_panel(tile, info.width, info.height);
    transport.push(
        device_id,
        &fitted,
        &PushOptions {
            clear: true,
            rotated: true,
        },
    )
}

/// Refits a tile to the resolution the panel itself reports. Detected sizes
/// carry measurement error, so tile dimensions rarely match exactly.
fn fit_to_panel(tile: &GrayImage, width: u32, height: u32) -> GrayImage {
    if tile.dimensions() == (width, height) {
        return tile.clone();
    }
    DynamicImage::ImageLuma8(tile.clone())
        .resize_to_fill(width, height, imageops::FilterType::Lanczos3)
        .to_luma8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use polyptych_core::{Point, Size};
    use polyptych_layout::PanelPlacement;

    use crate::transport::DeviceInfo;

    #[derive(Default)]
    struct MockTransport {
        fail: BTreeSet<String>,
        pushed: Mutex<Vec<(String, (u32, u32), PushOptions)>>,
        cleared: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn failing(ids: &[&str]) -> Self {
            Self {
                fail: ids.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        fn check(&self, device_id: &str) -> Result<(), TransportError> {
            if self.fail.contains(device_id) {
                Err(TransportError::Task(format!("{device_id} unreachable")))
            } else {
                Ok(())
            }
        }
    }

    impl Transport for MockTransport {
        fn query(&self, device_id: &str) -> Result<DeviceInfo, TransportError> {
            self.check(device_id)?;
            Ok(DeviceInfo {
                width: 64,
                height: 32,
                temperature: 21,
                screen_model: "MOCK".into(),
            })
        }

        fn push(
            &self,
            device_id: &str,
            image: &GrayImage,
            opts: &PushOptions,
        ) -> Result<(), TransportError> {
            self.check(device_id)?;
            self.pushed
                .lock()
                .expect("lock")
                .push((device_id.to_string(), image.dimensions(), *opts));
            Ok(())
        }

        fn clear(&self, device_id: &str) -> Result<(), TransportError> {
            self.check(device_id)?;
            self.cleared
                .lock()
                .expect("lock")
                .push(device_id.to_string());
            Ok(())
        }
    }

    fn layout_of(ids: &[&str]) -> Layout {
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                (
                    id.to_string(),
                    PanelPlacement {
                        device_id: id.to_string(),
                        screen_type: "ED060XC3".into(),
                        position: Point::new(20.0 + 140.0 * i as f64, 20.0),
                        rotation_deg: 0.0,
                        detected_size: Size {
                            width: 122.4,
                            height: 90.6,
                        },
                    },
                )
            })
            .collect()
    }

    fn source() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(800, 400, image::Luma([200])))
    }

    #[test]
    fn one_failing_panel_does_not_block_the_rest() {
        let transport = MockTransport::failing(&["10.0.0.22"]);
        let layout = layout_of(&["10.0.0.21", "10.0.0.22", "10.0.0.23"]);
        let report = send_layout_image(&transport, &layout, &source()).expect("dispatch");

        assert!(!report.all_ok());
        assert_eq!(report.failed(), vec!["10.0.0.22"]);
        assert_eq!(report.succeeded(), vec!["10.0.0.21", "10.0.0.23"]);

        let pushed = transport.pushed.lock().expect("lock");
        let ids: Vec<&str> = pushed.iter().map(|(id, _, _)| id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"10.0.0.21") && ids.contains(&"10.0.0.23"));
    }

    #[test]
    fn tiles_are_refit_and_flagged_for_rotation_and_clear() {
        let transport = MockTransport::default();
        let layout = layout_of(&["10.0.0.21"]);
        let report = send_layout_image(&transport, &layout, &source()).expect("dispatch");
        assert!(report.all_ok());

        let pushed = transport.pushed.lock().expect("lock");
        let (_, dims, opts) = &pushed[0];
        assert_eq!(*dims, (64, 32));
        assert!(opts.clear && opts.rotated);
    }

    #[test]
    fn empty_layout_is_rejected() {
        let transport = MockTransport::default();
        let err = send_layout_image(&transport, &Layout::new(), &source());
        assert!(matches!(err, Err(TileError::EmptyLayout)));
    }

    #[test]
    fn clear_reaches_every_panel() {
        let transport = MockTransport::default();
        let layout = layout_of(&["10.0.0.21", "10.0.0.22"]);
        let report = clear_panels(&transport, &layout);
        assert!(report.all_ok());
        let mut cleared = transport.cleared.lock().expect("lock").clone();
        cleared.sort();
        assert_eq!(cleared, vec!["10.0.0.21", "10.0.0.22"]);
    }

    #[test]
    fn clear_records_unreachable_panels() {
        let transport = MockTransport::failing(&["10.0.0.22"]);
        let layout = layout_of(&["10.0.0.21", "10.0.0.22"]);
        let report = clear_panels(&transport, &layout);
        assert_eq!(report.failed(), vec!["10.0.0.22"]);
        assert_eq!(
            transport.cleared.lock().expect("lock").as_slice(),
            ["10.0.0.21"]
        );
    }
}
