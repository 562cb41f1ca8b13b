use crate::config::{Config, Dataset, DatasetSource, Geocoding};
use anyhow::Result;
use pulse_core::{
    gateways::{
        debug::{BatchDebugSink, LogDebugSink},
        open_data::OpenDataGateway,
    },
    usecases::{BatchGeocoder, DateWindow},
};
use pulse_gateways::{
    arcgis::ArcGis, census::CensusBatchGeocoder, debug::PayloadsToJsonFile, socrata::Socrata,
};

pub fn batch_geocoder(cfg: &Config) -> Result<BatchGeocoder<CensusBatchGeocoder>> {
    let geocoding = &cfg.geocoding;
    let gw = CensusBatchGeocoder::try_new(&geocoding.api_url, geocoding.request_timeout)?;
    log::info!("Use batch geocoding service at {}", gw.api_url());
    let geocoder = BatchGeocoder::new(gw, geocoding.settings.clone());
    Ok(geocoder.with_debug_sink(debug_sink(geocoding)?))
}

fn debug_sink(geocoding: &Geocoding) -> Result<Box<dyn BatchDebugSink>> {
    match &geocoding.debug_dir {
        Some(dir) => {
            let sink = PayloadsToJsonFile::try_new(dir)?;
            log::info!("Recording geocoder traffic in {}", sink.path().display());
            Ok(Box::new(sink))
        }
        None => Ok(Box::new(LogDebugSink)),
    }
}

pub fn open_data_gateway(
    cfg: &Config,
    dataset: &Dataset,
    window: Option<&DateWindow>,
) -> Result<Box<dyn OpenDataGateway>> {
    let timeout = cfg.fetch.request_timeout;
    let gw: Box<dyn OpenDataGateway> = match &dataset.source {
        DatasetSource::Socrata { url } => {
            let mut gw = Socrata::try_new(url, timeout)?
                .with_select(dataset.fields.clone())
                .with_app_token(cfg.fetch.app_token.clone());
            if let (Some(window), Some(field)) = (window, &dataset.date_field) {
                gw = gw.with_where(window.socrata_where(field));
            }
            Box::new(gw)
        }
        DatasetSource::ArcGis { url } => {
            let mut gw = ArcGis::try_new(url, timeout)?.with_out_fields(dataset.fields.clone());
            if let (Some(window), Some(field)) = (window, &dataset.date_field) {
                gw = gw.with_where(window.arcgis_where(field));
            }
            Box::new(gw)
        }
    };
    Ok(gw)
}
