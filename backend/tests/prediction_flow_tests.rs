//! Training, persisting and reloading the crowd model through the service layer.

use chrono::{Duration, TimeZone, Timelike, Utc};

use crowd_predictor::api::{
    CrowdLevel, NewCrowdReport, NewStation, PredictionMethod, StationId, StationType, UserId,
};
use crowd_predictor::db::repositories::LocalRepository;
use crowd_predictor::db::repository::{ReportRepository, StationRepository};
use crowd_predictor::services::{NoWeather, PredictionService};

async fn seeded_repo() -> (LocalRepository, StationId) {
    let repo = LocalRepository::new();
    let station = repo
        .create_station(&NewStation {
            name: "Business District".to_string(),
            line: "Blue Line".to_string(),
            latitude: 40.7614,
            longitude: -73.9776,
            station_type: StationType::Metro,
        })
        .await
        .unwrap();

    // Three weeks of reports: packed at rush hour, light otherwise.
    let start = Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap();
    for h in (0..24 * 21).step_by(3) {
        let at = start + Duration::hours(h);
        let level = match at.hour() {
            7..=9 | 17..=19 => 5,
            10..=16 => 3,
            _ => 1,
        };
        repo.insert_report(&NewCrowdReport {
            station_id: station.id,
            user_id: UserId::new(1),
            crowd_level: CrowdLevel::new(level).unwrap(),
            description: None,
            temperature: None,
            weather_condition: None,
            created_at: at,
        })
        .await
        .unwrap();
    }
    (repo, station.id)
}

#[tokio::test]
async fn test_train_switches_to_model_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crowd-model.json");
    let (repo, station) = seeded_repo().await;
    let now = Utc.with_ymd_and_hms(2024, 5, 27, 6, 0, 0).unwrap();

    let service = PredictionService::new(Some(path.clone()), 7);
    assert!(!service.has_model());
    let before = service
        .create_prediction(&repo, &NoWeather, station, Some(2), now)
        .await
        .unwrap();
    assert_eq!(before.method, PredictionMethod::Heuristic);

    let summary = service.train(&repo, now).await.unwrap();
    assert!(summary.persisted);
    assert_eq!(summary.samples, repo.report_count());
    assert!(path.exists());
    assert!(service.has_model());

    let after = service
        .create_prediction(&repo, &NoWeather, station, Some(2), now)
        .await
        .unwrap();
    assert_eq!(after.method, PredictionMethod::Model);
    assert!((1.0..=5.0).contains(&after.prediction.predicted_crowd_level));
    assert!((0.0..=1.0).contains(&after.prediction.confidence_score));

    // A fresh service picks the saved model up from disk.
    let reloaded = PredictionService::new(Some(path), 7);
    assert!(reloaded.load_model_from_disk());
    let forecast = reloaded
        .hourly_predictions(&repo, station, Some(4), now)
        .await
        .unwrap();
    assert!(forecast
        .predictions
        .iter()
        .all(|p| p.outcome.method == PredictionMethod::Model));
}

#[tokio::test]
async fn test_corrupt_model_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crowd-model.json");
    std::fs::write(&path, "{\"coefficients\": []}").unwrap();

    let service = PredictionService::new(Some(path), 7);
    assert!(!service.load_model_from_disk());
    assert!(!service.has_model());
}

#[tokio::test]
async fn test_training_without_path_keeps_model_in_memory() {
    let (repo, _) = seeded_repo().await;
    let service = PredictionService::new(None, 7);
    let summary = service.train(&repo, Utc::now()).await.unwrap();
    assert!(!summary.persisted);
    assert!(service.has_model());
    assert!(summary.r_squared > 0.0);
}

#[tokio::test]
async fn test_training_survives_unwritable_model_path() {
    // The model's parent "directory" is a regular file, so saving fails.
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let path = blocker.path().join("crowd-model.json");
    let (repo, station) = seeded_repo().await;
    let now = Utc.with_ymd_and_hms(2024, 5, 27, 6, 0, 0).unwrap();

    let service = PredictionService::new(Some(path.clone()), 7);
    let summary = service.train(&repo, now).await.unwrap();
    assert!(!summary.persisted);
    assert!(!path.exists());
    assert!(service.has_model());

    let prediction = service
        .create_prediction(&repo, &NoWeather, station, Some(1), now)
        .await
        .unwrap();
    assert_eq!(prediction.method, PredictionMethod::Model);
}
