use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use leave_ai::config::AppConfig;
use leave_ai::error::AppError;
use leave_ai::telemetry;
use leave_ai::workflows::leave::{
    leave_router, AnalyzeRequest, BalanceSnapshot, BlackoutEntry, Employee, EmployeeId,
    LeaveDecisionService, LeaveStatus, MemoryLeaveStore, MemoryPolicyStore, RuleRegistry,
    SystemClock,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Leave Decision Service",
    about = "Evaluate employee leave requests against configurable policy rules",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the default rule catalog
    Rules {
        /// Include inactive rules
        #[arg(long)]
        all: bool,
    },
    /// Run a single analysis against demo data and print the decision
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Employee to evaluate (defaults to a demo employee)
    #[arg(long, default_value = "emp-001")]
    employee: String,
    /// Leave type label, e.g. "Annual Leave"
    #[arg(long, default_value = "Annual Leave")]
    leave_type: String,
    /// First day of leave (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    start: NaiveDate,
    /// Last day of leave (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    end: NaiveDate,
    /// Treat the request as a half day
    #[arg(long)]
    half_day: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Rules { all } => {
            print_rules(all);
            Ok(())
        }
        Command::Analyze(args) => run_analyze(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let store = Arc::new(demo_store());
    let policy = Arc::new(MemoryPolicyStore::new());
    let service = Arc::new(LeaveDecisionService::new(
        store,
        policy,
        config.policy.rule_cache_ttl,
        Arc::new(SystemClock),
    ));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(leave_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "leave decision service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn print_rules(all: bool) {
    let rules = if all {
        RuleRegistry::<MemoryPolicyStore>::full_defaults()
    } else {
        RuleRegistry::<MemoryPolicyStore>::active_defaults()
    };

    println!("Default rule catalog ({} rules)", rules.len());
    for rule in rules.values() {
        let blocking = if rule.is_blocking { "blocking" } else { "advisory" };
        let active = if rule.is_active { "" } else { " [inactive]" };
        println!(
            "- {} {} ({}, priority {}){}",
            rule.id,
            rule.name,
            blocking,
            rule.priority,
            active
        );
        println!("  {}", rule.description);
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let store = Arc::new(demo_store());
    let policy = Arc::new(MemoryPolicyStore::new());
    let service = LeaveDecisionService::new(
        store,
        policy,
        std::time::Duration::from_secs(300),
        Arc::new(SystemClock),
    );

    let response = service.analyze(AnalyzeRequest {
        employee_id: args.employee,
        leave_type: args.leave_type,
        start_date: args.start,
        end_date: args.end,
        total_days: None,
        is_half_day: args.half_day,
        reason: None,
        org_id: None,
    })?;

    println!("Leave analysis demo");
    if let Some(employee) = &response.employee {
        println!(
            "Employee: {} ({}, {})",
            employee.full_name, employee.employee_id.0, employee.department
        );
    }
    println!(
        "Request: {} from {} to {} ({} days)",
        response.leave_request.leave_type,
        response.leave_request.start_date,
        response.leave_request.end_date,
        response.leave_request.total_days
    );
    println!(
        "Decision: {} ({})",
        response.status, response.decision.decision_reason
    );

    if response.decision.violations.is_empty() {
        println!("\nViolations: none");
    } else {
        println!("\nViolations");
        for violation in &response.decision.violations {
            println!("- [{}] {}", violation.rule_id, violation.message);
        }
    }

    if !response.decision.warnings.is_empty() {
        println!("\nWarnings");
        for warning in &response.decision.warnings {
            println!("- [{}] {}", warning.rule_id, warning.message);
        }
    }

    if !response.suggestions.is_empty() {
        println!("\nSuggestions");
        for suggestion in &response.suggestions {
            println!("- {suggestion}");
        }
    }

    println!(
        "\nBalance: {} days available, {} after approval",
        response.balance.current_available, response.balance.after_approval
    );
    println!(
        "Team: {} of {} members would remain in {}",
        response.team_status.would_be_available(),
        response.team_status.unit_size,
        response.team_status.unit_name
    );

    Ok(())
}

/// Seeded in-memory dataset backing `serve` and `analyze` until a real
/// HR database is wired in.
fn demo_store() -> MemoryLeaveStore {
    let store = MemoryLeaveStore::new();
    let today = Local::now().date_naive();
    let year = today.year();

    let employees = [
        ("emp-001", "Asha Verma", "Engineering", 30),
        ("emp-002", "Luis Ortega", "Engineering", 24),
        ("emp-003", "Mina Park", "Engineering", 18),
        ("emp-004", "Tomás Silva", "Engineering", 10),
        ("emp-005", "Ruth Adler", "Finance", 48),
        ("emp-006", "Dev Narayan", "Finance", 3),
    ];
    for (id, name, department, tenure_months) in employees {
        let hire_date = today
            .checked_sub_months(chrono::Months::new(tenure_months))
            .unwrap_or(today);
        store.insert_employee(Employee {
            employee_id: EmployeeId(id.to_string()),
            full_name: name.to_string(),
            department: department.to_string(),
            hire_date,
            org_id: None,
            is_active: true,
        });
        store.insert_balance(
            &EmployeeId(id.to_string()),
            BalanceSnapshot {
                leave_type: "vacation".to_string(),
                year,
                entitlement: 20.0,
                carried_forward: 2.0,
                used_days: 4.0,
                pending_days: 0.0,
            },
        );
    }

    // One colleague already out next month, and a quarter-close blackout.
    if let (Some(start), Some(end)) = (
        today.checked_add_days(chrono::Days::new(20)),
        today.checked_add_days(chrono::Days::new(24)),
    ) {
        store.insert_leave(
            &EmployeeId("emp-002".to_string()),
            "Annual Leave",
            start,
            end,
            5.0,
            LeaveStatus::Approved,
        );
    }
    if let (Some(start), Some(end)) = (
        today.checked_add_days(chrono::Days::new(55)),
        today.checked_add_days(chrono::Days::new(60)),
    ) {
        store.insert_blackout(BlackoutEntry {
            name: "Quarter close".to_string(),
            start_date: start,
            end_date: end,
        });
    }

    store
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
