use std::{collections::HashMap, fmt, net::SocketAddr};

use anyhow::Context;
use cucumber::{given, then, when, World as _};
use tempfile::TempDir;
use url::Url;
use wayfarer::{
    analytics,
    auth::{self, AuthenticatedUser},
    config::AppConfig,
    db::init_pool,
    forms::{ActivityForm, PackingItemForm, TripForm, TripPackingForm},
    models::{
        activity::{Activity, ActivityWithTags},
        destination::Destination,
        packing::{PackingItem, PackingLinkRow, TripPackingItem},
        tag::Tag,
        trip::Trip,
    },
    services::weather::{ForecastSource, WeatherReport, WeatherService},
    state::AppState,
};

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    users: HashMap<String, AuthenticatedUser>,
    current_user: Option<String>,
    trip_id: Option<i64>,
    last_errors: Vec<String>,
    last_report: Option<WeatherReport>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn user(&self, name: &str) -> &AuthenticatedUser {
        self.users
            .get(name)
            .unwrap_or_else(|| panic!("user {name} must be registered first"))
    }

    fn current(&self) -> &AuthenticatedUser {
        let name = self
            .current_user
            .as_deref()
            .expect("a user must be registered first");
        self.user(name)
    }

    fn trip_id(&self) -> i64 {
        self.trip_id.expect("a trip must be created first")
    }

    async fn destination_by_name(&self, name: &str) -> Destination {
        Destination::list_all(&self.app_state().db)
            .await
            .expect("list destinations")
            .into_iter()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("destination {name} must exist in the catalog"))
    }

    async fn create_trip(
        &mut self,
        public: bool,
        title: String,
        destination: String,
        start: String,
        end: String,
        budget: String,
    ) {
        let destination = self.destination_by_name(&destination).await;
        let form = TripForm {
            title,
            destination: destination.id.to_string(),
            start_date: start,
            end_date: end,
            budget,
            is_public: public.then(|| "on".to_string()),
        };
        let destinations = Destination::list_all(&self.app_state().db)
            .await
            .expect("list destinations");
        match form.validate(&destinations) {
            Ok(input) => {
                let owner = self.current().id;
                let id = Trip::insert(&self.app_state().db, owner, &input)
                    .await
                    .expect("insert trip");
                self.trip_id = Some(id);
                self.last_errors = Vec::new();
            }
            Err(errors) => {
                self.last_errors = errors;
            }
        }
    }

    async fn add_activity(&mut self, title: String, date: String, cost: String) {
        let state = self.app_state().clone();
        let trip = Trip::find(&state.db, self.trip_id())
            .await
            .expect("load trip")
            .expect("trip exists");
        let owner_tags = Tag::list_for_owner(&state.db, self.current().id)
            .await
            .expect("list tags");
        let form = ActivityForm {
            title,
            date,
            cost,
            notes: String::new(),
            tags: Vec::new(),
        };
        match form.validate(&trip, &owner_tags) {
            Ok(input) => {
                Activity::insert(&state.db, trip.id, &input)
                    .await
                    .expect("insert activity");
                self.last_errors = Vec::new();
            }
            Err(errors) => {
                self.last_errors = errors;
            }
        }
    }

    async fn link_item(&mut self, item_name: String, quantity: String) {
        let state = self.app_state().clone();
        let items = PackingItem::list_for_owner(&state.db, self.current().id)
            .await
            .expect("list items");
        let item = items
            .iter()
            .find(|item| item.name == item_name)
            .unwrap_or_else(|| panic!("item {item_name} must exist"));
        let form = TripPackingForm {
            item: item.id.to_string(),
            quantity,
            is_packed: None,
            note: String::new(),
        };
        match form.validate(&items) {
            Ok(input) => match TripPackingItem::add(&state.db, self.trip_id(), &input).await {
                Ok(_) => self.last_errors = Vec::new(),
                Err(wayfarer::error::AppError::BadRequest(message)) => {
                    self.last_errors = vec![message];
                }
                Err(err) => panic!("unexpected error linking item: {err}"),
            },
            Err(errors) => {
                self.last_errors = errors;
            }
        }
    }

    async fn packing_link(&self, item_name: &str) -> PackingLinkRow {
        TripPackingItem::list_for_trip(&self.app_state().db, self.trip_id())
            .await
            .expect("list packing links")
            .into_iter()
            .find(|link| link.item_name == item_name)
            .unwrap_or_else(|| panic!("link for {item_name} must exist"))
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        // Port 9 is never served; weather steps only exercise offline paths.
        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cookie_secret: "bdd-cookie-secret".into(),
            weather_base_url: Url::parse("http://127.0.0.1:9/forecast")?,
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let weather = WeatherService::new(config.weather_base_url.clone())?;
        let app = AppState::new(config, db, weather);
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.users.clear();
    world.current_user = None;
    world.trip_id = None;
    world.last_errors = Vec::new();
    world.last_report = None;
}

#[given(regex = r#"^a registered user \"([^\"]+)\" with password \"([^\"]+)\"$"#)]
async fn given_registered_user(world: &mut AppWorld, username: String, password: String) {
    let email = format!("{username}@example.com");
    register_user(world, username, email, password).await;
}

#[when(
    regex = r#"^I register a user \"([^\"]+)\" with email \"([^\"]+)\" and password \"([^\"]+)\"$"#
)]
async fn when_register_user(
    world: &mut AppWorld,
    username: String,
    email: String,
    password: String,
) {
    register_user(world, username, email, password).await;
}

#[then(regex = r#"^I can authenticate as \"([^\"]+)\" using password \"([^\"]+)\"$"#)]
async fn then_can_authenticate(world: &mut AppWorld, identifier: String, password: String) {
    let authed = auth::authenticate_user(world.app_state(), &identifier, &password)
        .await
        .expect("authentication");
    assert_eq!(authed.username, identifier);
}

#[given(
    regex = r#"^a public trip \"([^\"]+)\" to \"([^\"]+)\" from \"([^\"]+)\" to \"([^\"]+)\" with budget \"([^\"]+)\"$"#
)]
async fn given_public_trip(
    world: &mut AppWorld,
    title: String,
    destination: String,
    start: String,
    end: String,
    budget: String,
) {
    world
        .create_trip(true, title, destination, start, end, budget)
        .await;
    assert!(world.last_errors.is_empty(), "trip should be valid");
}

#[when(
    regex = r#"^I (?:try to )?create a (public|private) trip \"([^\"]+)\" to \"([^\"]+)\" from \"([^\"]+)\" to \"([^\"]+)\" with budget \"([^\"]+)\"$"#
)]
async fn when_create_trip(
    world: &mut AppWorld,
    visibility: String,
    title: String,
    destination: String,
    start: String,
    end: String,
    budget: String,
) {
    world
        .create_trip(visibility == "public", title, destination, start, end, budget)
        .await;
}

#[then(regex = r#"^trip creation fails mentioning \"([^\"]+)\"$"#)]
async fn then_trip_creation_fails(world: &mut AppWorld, fragment: String) {
    assert!(
        world
            .last_errors
            .iter()
            .any(|message| message.contains(&fragment)),
        "expected an error mentioning {fragment:?}, got {:?}",
        world.last_errors
    );
}

#[when(
    regex = r#"^I (?:try to )?add an activity \"([^\"]+)\" on \"([^\"]+)\" costing \"([^\"]+)\"$"#
)]
async fn when_add_activity(world: &mut AppWorld, title: String, date: String, cost: String) {
    world.add_activity(title, date, cost).await;
}

#[then(regex = r#"^activity creation fails mentioning \"([^\"]+)\"$"#)]
async fn then_activity_creation_fails(world: &mut AppWorld, fragment: String) {
    assert!(
        world
            .last_errors
            .iter()
            .any(|message| message.contains(&fragment)),
        "expected an error mentioning {fragment:?}, got {:?}",
        world.last_errors
    );
}

#[then(regex = r#"^the trip totals show \"([^\"]+)\" spent and \"([^\"]+)\" remaining$"#)]
async fn then_trip_totals(world: &mut AppWorld, spent: String, remaining: String) {
    let state = world.app_state();
    let trip = Trip::find(&state.db, world.trip_id())
        .await
        .expect("load trip")
        .expect("trip exists");
    let activities = ActivityWithTags::list_for_trip(&state.db, trip.id)
        .await
        .expect("load activities");
    let stats = analytics::analyze(trip.budget, &activities);
    let spent: f64 = spent.parse().expect("numeric spent");
    let remaining: f64 = remaining.parse().expect("numeric remaining");
    assert!((stats.total_cost - spent).abs() < 1e-9, "total {}", stats.total_cost);
    assert!(
        (stats.remaining - remaining).abs() < 1e-9,
        "remaining {}",
        stats.remaining
    );
}

#[then(regex = r#"^the budget percentage is \"([^\"]+)\"$"#)]
async fn then_budget_percentage(world: &mut AppWorld, expected: String) {
    let state = world.app_state();
    let trip = Trip::find(&state.db, world.trip_id())
        .await
        .expect("load trip")
        .expect("trip exists");
    let activities = ActivityWithTags::list_for_trip(&state.db, trip.id)
        .await
        .expect("load activities");
    let stats = analytics::analyze(trip.budget, &activities);
    let expected: f64 = expected.parse().expect("numeric percentage");
    assert_eq!(stats.budget_pct, Some(expected));
}

#[then(regex = r#"^\"([^\"]+)\" can see the trip$"#)]
async fn then_user_sees_trip(world: &mut AppWorld, username: String) {
    let viewer = world.user(&username).id;
    let visible = Trip::find_visible(&world.app_state().db, world.trip_id(), Some(viewer))
        .await
        .expect("visibility query");
    assert!(visible.is_some(), "{username} should see the trip");
}

#[then(regex = r#"^\"([^\"]+)\" cannot see the trip$"#)]
async fn then_user_cannot_see_trip(world: &mut AppWorld, username: String) {
    let viewer = world.user(&username).id;
    let visible = Trip::find_visible(&world.app_state().db, world.trip_id(), Some(viewer))
        .await
        .expect("visibility query");
    assert!(visible.is_none(), "{username} should not see the trip");
}

#[then("an anonymous visitor can see the trip")]
async fn then_anonymous_sees_trip(world: &mut AppWorld) {
    let visible = Trip::find_visible(&world.app_state().db, world.trip_id(), None)
        .await
        .expect("visibility query");
    assert!(visible.is_some(), "anonymous visitors should see the trip");
}

#[given(regex = r#"^a packing item \"([^\"]+)\" in category \"([^\"]+)\"$"#)]
async fn given_packing_item(world: &mut AppWorld, name: String, category: String) {
    let form = PackingItemForm { name, category };
    let input = form.validate().expect("valid item");
    let owner = world.current().id;
    PackingItem::create(&world.app_state().db, owner, &input)
        .await
        .expect("create item");
}

#[when(regex = r#"^I (?:try to )?link \"([^\"]+)\" to the trip with quantity \"([^\"]+)\"$"#)]
async fn when_link_item(world: &mut AppWorld, item: String, quantity: String) {
    world.link_item(item, quantity).await;
}

#[then(regex = r#"^linking fails mentioning \"([^\"]+)\"$"#)]
async fn then_linking_fails(world: &mut AppWorld, fragment: String) {
    assert!(
        world
            .last_errors
            .iter()
            .any(|message| message.contains(&fragment)),
        "expected an error mentioning {fragment:?}, got {:?}",
        world.last_errors
    );
}

#[when(regex = r#"^I toggle the packing link for \"([^\"]+)\"$"#)]
async fn when_toggle_link(world: &mut AppWorld, item: String) {
    let link = world.packing_link(&item).await;
    TripPackingItem::toggle(&world.app_state().db, link.id)
        .await
        .expect("toggle link");
}

#[then(regex = r#"^the packing link for \"([^\"]+)\" is packed$"#)]
async fn then_link_packed(world: &mut AppWorld, item: String) {
    let link = world.packing_link(&item).await;
    assert!(link.is_packed, "{item} should be packed");
}

#[then(regex = r#"^the packing link for \"([^\"]+)\" is not packed$"#)]
async fn then_link_not_packed(world: &mut AppWorld, item: String) {
    let link = world.packing_link(&item).await;
    assert!(!link.is_packed, "{item} should not be packed");
}

#[then(regex = r#"^the packing counts are \"(\d+)\" of \"(\d+)\"$"#)]
async fn then_packing_counts(world: &mut AppWorld, packed: i64, total: i64) {
    let counts = TripPackingItem::counts(&world.app_state().db, world.trip_id())
        .await
        .expect("counts");
    assert_eq!(counts, (packed, total));
}

#[then(regex = r#"^the packing completion is \"([^\"]+)\"$"#)]
async fn then_packing_completion(world: &mut AppWorld, expected: String) {
    let (packed, total) = TripPackingItem::counts(&world.app_state().db, world.trip_id())
        .await
        .expect("counts");
    let expected: f64 = expected.parse().expect("numeric completion");
    assert_eq!(analytics::packing_completion(packed, total), Some(expected));
}

#[then("the packing completion is undefined")]
async fn then_packing_completion_undefined(world: &mut AppWorld) {
    let (packed, total) = TripPackingItem::counts(&world.app_state().db, world.trip_id())
        .await
        .expect("counts");
    assert_eq!(analytics::packing_completion(packed, total), None);
}

#[when("I request a forecast without coordinates")]
async fn when_forecast_without_coordinates(world: &mut AppWorld) {
    let report = world.app_state().weather.forecast(None, None).await;
    world.last_report = Some(report);
}

#[then("the forecast is degraded with no data")]
async fn then_forecast_degraded(world: &mut AppWorld) {
    let report = world.last_report.as_ref().expect("a forecast was requested");
    assert!(!report.ok);
    assert_eq!(report.source, ForecastSource::Unavailable);
    assert!(report.data.is_none());
    assert!(report.daily_rows().is_empty());
}

async fn register_user(world: &mut AppWorld, username: String, email: String, password: String) {
    let created = auth::register_user(world.app_state(), &username, &email, &password)
        .await
        .expect("register user");
    if world.current_user.is_none() {
        world.current_user = Some(username.clone());
    }
    world.users.insert(username, created);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
