//! Control loop: lifecycle state machine and the three periodic workers.
//!
//! Workers poll on their own sleep timers and observe a shared atomic run
//! state. Shutdown is cooperative: `stop` flips the state, signals the
//! workers and waits a bounded time for them to finish their iteration.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trading_core::error::ControlError;
use trading_core::traits::{
    AdvisoryService, ExchangeGateway, NotificationKind, NotificationSink, SignalSource,
};
use trading_core::types::{Signal, SignalAction, TradeRecord, QUOTE_CURRENCY};
use trading_risk::HaltReason;

use crate::{
    advisory_alerts, build_snapshot, BookSnapshot, LiquidationReport, OrderExecutor, SharedBook,
    StatusReport,
};

const KST_UTC_OFFSET_HOURS: i64 = 9;
/// A capital limit above this share of the balance is allowed but flagged.
const CAPITAL_LIMIT_WARN_RATIO: Decimal = dec!(0.8);

/// Lifecycle state of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunState {
    Stopped = 0,
    Running = 1,
    Paused = 2,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunState::Running,
            2 => RunState::Paused,
            _ => RunState::Stopped,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Stopped => write!(f, "stopped"),
            RunState::Running => write!(f, "running"),
            RunState::Paused => write!(f, "paused"),
        }
    }
}

/// Worker timing and the markets to trade.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    pub symbols: Vec<String>,
    pub trading_interval: Duration,
    pub advisory_interval: Duration,
    pub report_interval: Duration,
    /// Upper bound on waiting for workers in `stop`
    pub drain_timeout: Duration,
    /// KST hour at which a new trading day starts
    pub day_reset_hour: u32,
    /// Advisory sell confidence that vetoes a buy
    pub advisory_veto_confidence: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["KRW-BTC".to_string(), "KRW-ETH".to_string()],
            trading_interval: Duration::from_secs(10),
            advisory_interval: Duration::from_secs(30 * 60),
            report_interval: Duration::from_secs(30 * 60),
            drain_timeout: Duration::from_secs(10),
            day_reset_hour: 9,
            advisory_veto_confidence: 0.7,
        }
    }
}

/// Trading day containing `now`, where days start at `reset_hour` KST.
pub fn trading_day(now: DateTime<Utc>, reset_hour: u32) -> NaiveDate {
    let shift = KST_UTC_OFFSET_HOURS - i64::from(reset_hour);
    (now + ChronoDuration::hours(shift)).date_naive()
}

/// Run state and book, observed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlStatus {
    pub state: RunState,
    pub trading_day: Option<NaiveDate>,
    pub halt_reason: Option<HaltReason>,
    pub book: BookSnapshot,
}

struct Workers {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

struct Shared {
    state: AtomicU8,
    config: ControlConfig,
    book: SharedBook,
    executor: OrderExecutor,
    exchange: Arc<dyn ExchangeGateway>,
    signals: Arc<dyn SignalSource>,
    advisory: Option<Arc<dyn AdvisoryService>>,
    notifier: Arc<dyn NotificationSink>,
    trading_day: Mutex<Option<NaiveDate>>,
    halt_reason: Mutex<Option<HaltReason>>,
}

/// Drives signal polling, execution, advisory monitoring and reporting.
pub struct ControlLoop {
    shared: Arc<Shared>,
    workers: Mutex<Option<Workers>>,
}

impl ControlLoop {
    pub fn new(
        config: ControlConfig,
        book: SharedBook,
        exchange: Arc<dyn ExchangeGateway>,
        signals: Arc<dyn SignalSource>,
        notifier: Arc<dyn NotificationSink>,
        advisory: Option<Arc<dyn AdvisoryService>>,
    ) -> Self {
        let executor = OrderExecutor::new(exchange.clone(), book.clone());
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(RunState::Stopped as u8),
                config,
                book,
                executor,
                exchange,
                signals,
                advisory,
                notifier,
                trading_day: Mutex::new(None),
                halt_reason: Mutex::new(None),
            }),
            workers: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    pub fn book(&self) -> &SharedBook {
        &self.shared.book
    }

    /// Start the workers. Fails if already running or paused, or if the
    /// account does not pass the fund-safety check.
    pub async fn start(&self) -> Result<(), ControlError> {
        let mut workers = self.workers.lock().await;
        if self.state() != RunState::Stopped {
            return Err(ControlError::AlreadyRunning);
        }
        // Left behind by a daily halt.
        if let Some(stale) = workers.take() {
            drain(stale, self.shared.config.drain_timeout).await;
        }

        self.shared.check_fund_safety().await?;
        *self.shared.halt_reason.lock().await = None;
        self.shared.roll_trading_day(Utc::now()).await;

        let (shutdown, receiver) = watch::channel(false);
        self.shared.set_state(RunState::Running);

        let mut handles = vec![
            tokio::spawn(trading_worker(self.shared.clone(), receiver.clone())),
            tokio::spawn(report_worker(self.shared.clone(), receiver.clone())),
        ];
        if self.shared.advisory.is_some() {
            handles.push(tokio::spawn(advisory_worker(self.shared.clone(), receiver)));
        }
        *workers = Some(Workers { shutdown, handles });

        info!(
            symbols = ?self.shared.config.symbols,
            interval_secs = self.shared.config.trading_interval.as_secs_f64(),
            exchange = self.shared.exchange.name(),
            signals = self.shared.signals.name(),
            "Control loop started"
        );
        self.shared
            .notifier
            .notify("Trading started", NotificationKind::Info)
            .await;
        Ok(())
    }

    /// Stop the workers, waiting up to the drain timeout. Returns false if
    /// the loop was already stopped.
    pub async fn stop(&self) -> bool {
        let mut workers = self.workers.lock().await;
        let previous = self.shared.swap_state(RunState::Stopped);
        if let Some(running) = workers.take() {
            drain(running, self.shared.config.drain_timeout).await;
        }
        if previous == RunState::Stopped {
            return false;
        }

        info!("Control loop stopped");
        self.shared
            .notifier
            .notify("Trading stopped", NotificationKind::Info)
            .await;
        true
    }

    /// Suspend trading. Workers keep sleeping and skip their work.
    pub fn pause(&self) -> Result<(), ControlError> {
        match self.shared.transition(RunState::Running, RunState::Paused) {
            Ok(()) | Err(RunState::Paused) => {
                info!("Control loop paused");
                Ok(())
            }
            Err(_) => Err(ControlError::NotRunning),
        }
    }

    pub fn resume(&self) -> Result<(), ControlError> {
        match self.shared.transition(RunState::Paused, RunState::Running) {
            Ok(()) | Err(RunState::Running) => {
                info!("Control loop resumed");
                Ok(())
            }
            Err(_) => Err(ControlError::NotRunning),
        }
    }

    /// Reason for the last daily halt, cleared on start.
    pub async fn halt_reason(&self) -> Option<HaltReason> {
        self.shared.halt_reason.lock().await.clone()
    }

    pub async fn status(&self) -> ControlStatus {
        ControlStatus {
            state: self.state(),
            trading_day: *self.shared.trading_day.lock().await,
            halt_reason: self.halt_reason().await,
            book: self.shared.book.snapshot().await,
        }
    }

    pub async fn report(&self) -> StatusReport {
        StatusReport::build(&self.shared.book, self.shared.exchange.as_ref()).await
    }

    /// Liquidate every position now, regardless of run state.
    pub async fn emergency_sell_all(&self) -> LiquidationReport {
        let report = self.shared.executor.emergency_sell_all().await;
        let message = format!(
            "Emergency liquidation: {} sold, {} failed",
            report.trades.len(),
            report.failure_count()
        );
        self.shared
            .notifier
            .notify(&message, NotificationKind::Emergency)
            .await;
        report
    }
}

impl Shared {
    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn swap_state(&self, state: RunState) -> RunState {
        RunState::from_u8(self.state.swap(state as u8, Ordering::SeqCst))
    }

    /// Compare-and-set; on failure returns the state actually found.
    fn transition(&self, from: RunState, to: RunState) -> Result<(), RunState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(RunState::from_u8)
    }

    async fn check_fund_safety(&self) -> Result<(), ControlError> {
        let balance = self.exchange.get_balance(QUOTE_CURRENCY).await?;
        let config = self.book.read().await.risk().config().clone();

        if balance < config.min_trade_amount {
            return Err(ControlError::FundSafety(format!(
                "KRW balance {} is below the minimum trade amount {}",
                balance, config.min_trade_amount
            )));
        }
        if let Some(limit) = config.capital_limit {
            if limit > balance {
                return Err(ControlError::FundSafety(format!(
                    "capital limit {} exceeds KRW balance {}",
                    limit, balance
                )));
            }
            if limit > balance * CAPITAL_LIMIT_WARN_RATIO {
                warn!(
                    capital_limit = %limit,
                    balance = %balance,
                    "Capital limit exceeds 80% of the KRW balance"
                );
            }
        }

        info!(balance = %balance, capital_limit = ?config.capital_limit, "Fund safety check passed");
        Ok(())
    }

    async fn roll_trading_day(&self, now: DateTime<Utc>) {
        let today = trading_day(now, self.config.day_reset_hour);
        let mut current = self.trading_day.lock().await;
        match *current {
            Some(day) if day == today => {}
            Some(day) => {
                info!(previous = %day, today = %today, "New trading day, resetting daily risk state");
                self.book.reset_daily().await;
                *current = Some(today);
            }
            None => *current = Some(today),
        }
    }

    async fn trading_pass(&self) {
        self.roll_trading_day(Utc::now()).await;

        let halt = self.book.read().await.risk().check_daily_limits();
        if let Some(reason) = halt {
            self.halt(reason).await;
            return;
        }

        for symbol in &self.config.symbols {
            if self.state() != RunState::Running {
                return;
            }
            self.process_symbol(symbol).await;
        }

        self.check_stop_losses().await;
    }

    async fn halt(&self, reason: HaltReason) {
        if self.swap_state(RunState::Stopped) == RunState::Stopped {
            return;
        }
        error!(reason = %reason, "Daily limit reached, halting trading");
        *self.halt_reason.lock().await = Some(reason.clone());
        self.notifier
            .notify(
                &format!("Trading halted: {}", reason),
                NotificationKind::Emergency,
            )
            .await;
    }

    async fn process_symbol(&self, symbol: &str) {
        let Some(signal) = self.signals.analyze(symbol).await else {
            return;
        };

        let result = match signal.action {
            SignalAction::Buy => {
                if self.advisory_vetoes(&signal).await {
                    return;
                }
                self.executor.execute_buy(&signal).await
            }
            SignalAction::Sell => {
                if !self.book.read().await.ledger().contains(symbol) {
                    debug!(symbol, "Sell signal without a position");
                    return;
                }
                self.executor.execute_sell(&signal).await
            }
            SignalAction::Hold => return,
        };

        match result {
            Ok(trade) => self.notify_trade(&trade, NotificationKind::Trade, "").await,
            Err(e) if e.is_declined() => debug!(symbol, reason = %e, "Trade declined"),
            Err(e) if e.is_transient() => {
                warn!(symbol, error = %e, "Trade failed, retrying next pass")
            }
            Err(e) => error!(symbol, error = %e, "Trade failed"),
        }
    }

    async fn advisory_vetoes(&self, signal: &Signal) -> bool {
        let Some(advisory) = &self.advisory else {
            return false;
        };

        let (snapshot, positions) =
            build_snapshot(&self.book, self.exchange.as_ref(), &self.config.symbols).await;
        let limits = self.book.read().await.risk().config().limits();

        match advisory.evaluate(&snapshot, &positions, &limits).await {
            Ok(recommendation) if recommendation.vetoes_buy(self.config.advisory_veto_confidence) => {
                info!(
                    symbol = %signal.symbol,
                    confidence = recommendation.confidence,
                    reasoning = %recommendation.reasoning,
                    "Advisory vetoed buy"
                );
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(symbol = %signal.symbol, error = %e, "Advisory unavailable, proceeding");
                false
            }
        }
    }

    async fn check_stop_losses(&self) {
        let positions = self.book.read().await.ledger().snapshot();
        for position in positions {
            let price = match self.exchange.get_current_price(&position.symbol).await {
                Ok(Some(price)) => price,
                Ok(None) => continue,
                Err(e) => {
                    warn!(symbol = %position.symbol, error = %e, "Price unavailable for stop-loss check");
                    continue;
                }
            };

            if !self.book.read().await.risk().should_stop_loss(&position, price) {
                continue;
            }
            warn!(
                symbol = %position.symbol,
                price = %price,
                stop_loss_price = %position.stop_loss_price,
                "Stop-loss triggered"
            );

            match self.executor.liquidate(&position.symbol, "stop_loss").await {
                Ok(trade) => {
                    self.notify_trade(&trade, NotificationKind::Emergency, "Stop-loss: ")
                        .await
                }
                Err(e) => error!(symbol = %position.symbol, error = %e, "Stop-loss sell failed"),
            }
        }
    }

    async fn notify_trade(&self, trade: &TradeRecord, kind: NotificationKind, prefix: &str) {
        let paper = if trade.is_paper_trade { "[PAPER] " } else { "" };
        let message = format!("{}{}{}", paper, prefix, trade.summary());
        self.notifier.notify(&message, kind).await;
    }

    async fn advisory_pass(&self, advisory: &dyn AdvisoryService) {
        let (snapshot, positions) =
            build_snapshot(&self.book, self.exchange.as_ref(), &self.config.symbols).await;
        let limits = self.book.read().await.risk().config().limits();

        match advisory.evaluate(&snapshot, &positions, &limits).await {
            Ok(recommendation) => {
                debug!(
                    action = %recommendation.action,
                    confidence = recommendation.confidence,
                    risk_score = recommendation.risk_score,
                    "Advisory evaluation"
                );
                for (kind, message) in
                    advisory_alerts(&recommendation, positions.len(), limits.max_positions)
                {
                    if kind == NotificationKind::Emergency {
                        warn!(risk_score = recommendation.risk_score, "Advisory flagged high risk");
                    }
                    self.notifier.notify(&message, kind).await;
                }
            }
            Err(e) => warn!(error = %e, "Advisory evaluation failed"),
        }
    }

    async fn report_pass(&self) {
        let report = StatusReport::build(&self.book, self.exchange.as_ref()).await;
        self.notifier
            .notify(&report.render(), NotificationKind::Report)
            .await;
    }
}

/// Sleep for `interval`. Returns true when shutdown was signalled instead.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    let closed = tokio::select! {
        _ = tokio::time::sleep(interval) => return false,
        changed = shutdown.changed() => changed.is_err(),
    };
    closed || *shutdown.borrow()
}

async fn trading_worker(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    debug!("Trading worker started");
    loop {
        match shared.state() {
            RunState::Stopped => break,
            RunState::Paused => debug!("Trading paused, skipping pass"),
            RunState::Running => shared.trading_pass().await,
        }
        if shared.state() == RunState::Stopped {
            break;
        }
        if sleep_or_shutdown(&mut shutdown, shared.config.trading_interval).await {
            break;
        }
    }
    debug!("Trading worker exited");
}

async fn advisory_worker(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let Some(advisory) = shared.advisory.clone() else {
        return;
    };
    debug!("Advisory worker started");
    loop {
        if sleep_or_shutdown(&mut shutdown, shared.config.advisory_interval).await {
            break;
        }
        match shared.state() {
            RunState::Stopped => break,
            RunState::Paused => continue,
            RunState::Running => shared.advisory_pass(advisory.as_ref()).await,
        }
    }
    debug!("Advisory worker exited");
}

async fn report_worker(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    debug!("Report worker started");
    loop {
        if sleep_or_shutdown(&mut shutdown, shared.config.report_interval).await {
            break;
        }
        match shared.state() {
            RunState::Stopped => break,
            RunState::Paused => continue,
            RunState::Running => shared.report_pass().await,
        }
    }
    debug!("Report worker exited");
}

async fn drain(workers: Workers, timeout: Duration) {
    let _ = workers.shutdown.send(true);
    match tokio::time::timeout(timeout, join_all(workers.handles)).await {
        Ok(results) => {
            for result in results {
                if let Err(e) = result {
                    error!(error = %e, "Worker task failed");
                }
            }
        }
        Err(_) => warn!(
            timeout_secs = timeout.as_secs_f64(),
            "Workers did not finish within the drain timeout"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GatedExchange;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use trading_broker::{PaperExchange, ReplayFeed, Tick};
    use trading_core::error::{AdvisoryError, ExchangeError};
    use trading_core::traits::Recommendation;
    use trading_core::types::{MarketSnapshot, Position, RiskState, TradingLimits};
    use trading_risk::RiskConfig;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: std::sync::Mutex<Vec<(NotificationKind, String)>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<(NotificationKind, String)> {
            self.messages.lock().unwrap().clone()
        }

        fn count(&self, kind: NotificationKind) -> usize {
            self.messages().iter().filter(|(k, _)| *k == kind).count()
        }

        fn any(&self, kind: NotificationKind, needle: &str) -> bool {
            self.messages()
                .iter()
                .any(|(k, m)| *k == kind && m.contains(needle))
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingNotifier {
        async fn notify(&self, message: &str, kind: NotificationKind) {
            self.messages.lock().unwrap().push((kind, message.to_string()));
        }
    }

    struct FixedAdvisory(Result<Recommendation, AdvisoryError>);

    #[async_trait]
    impl AdvisoryService for FixedAdvisory {
        async fn evaluate(
            &self,
            _snapshot: &MarketSnapshot,
            _positions: &[Position],
            _limits: &TradingLimits,
        ) -> Result<Recommendation, AdvisoryError> {
            self.0.clone()
        }
    }

    fn tick(symbol: &str, price: Decimal, action: SignalAction) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            price,
            action,
            confidence: 1.0,
            tags: Vec::new(),
        }
    }

    struct Fixture {
        control: ControlLoop,
        exchange: Arc<PaperExchange>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture_with(
        krw: Decimal,
        risk: RiskConfig,
        ticks: Vec<Tick>,
        advisory: Option<Arc<dyn AdvisoryService>>,
    ) -> Fixture {
        let exchange = Arc::new(
            PaperExchange::new(krw)
                .with_price("KRW-BTC", dec!(50000))
                .with_price("KRW-ETH", dec!(2000)),
        );
        let feed = Arc::new(ReplayFeed::new(ticks).with_exchange(exchange.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = ControlConfig {
            trading_interval: Duration::from_millis(20),
            advisory_interval: Duration::from_millis(20),
            report_interval: Duration::from_millis(20),
            drain_timeout: Duration::from_secs(2),
            ..ControlConfig::default()
        };
        let control = ControlLoop::new(
            config,
            SharedBook::new(risk),
            exchange.clone(),
            feed,
            notifier.clone(),
            advisory,
        );
        Fixture {
            control,
            exchange,
            notifier,
        }
    }

    fn fixture(ticks: Vec<Tick>) -> Fixture {
        fixture_with(dec!(1000000), RiskConfig::default(), ticks, None)
    }

    fn sell_advice(confidence: f64) -> FixedAdvisory {
        FixedAdvisory(Ok(Recommendation {
            action: SignalAction::Sell,
            confidence,
            reasoning: "overheated".to_string(),
            risk_score: 0.9,
        }))
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let f = fixture(Vec::new());
        assert_eq!(f.control.state(), RunState::Stopped);
        assert_eq!(f.control.pause(), Err(ControlError::NotRunning));

        f.control.start().await.unwrap();
        assert_eq!(f.control.state(), RunState::Running);
        assert_eq!(f.control.start().await, Err(ControlError::AlreadyRunning));

        f.control.pause().unwrap();
        assert_eq!(f.control.state(), RunState::Paused);
        assert_eq!(f.control.start().await, Err(ControlError::AlreadyRunning));
        f.control.resume().unwrap();
        assert_eq!(f.control.state(), RunState::Running);

        assert!(f.control.stop().await);
        assert_eq!(f.control.state(), RunState::Stopped);
        assert!(!f.control.stop().await);
        assert_eq!(f.control.resume(), Err(ControlError::NotRunning));

        assert!(f.notifier.any(NotificationKind::Info, "started"));
        assert!(f.notifier.any(NotificationKind::Info, "stopped"));
    }

    #[tokio::test]
    async fn test_fund_safety_blocks_start() {
        let f = fixture_with(dec!(10000), RiskConfig::default(), Vec::new(), None);
        assert!(matches!(
            f.control.start().await,
            Err(ControlError::FundSafety(_))
        ));
        assert_eq!(f.control.state(), RunState::Stopped);

        let risk = RiskConfig {
            capital_limit: Some(dec!(2000000)),
            ..RiskConfig::default()
        };
        let f = fixture_with(dec!(1000000), risk, Vec::new(), None);
        assert!(matches!(
            f.control.start().await,
            Err(ControlError::FundSafety(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_loss_then_daily_halt() {
        let f = fixture(vec![
            tick("KRW-BTC", dec!(50000), SignalAction::Buy),
            tick("KRW-BTC", dec!(40000), SignalAction::Hold),
        ]);
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);

        shared.trading_pass().await;
        let position = f.control.book().read().await.ledger().get("KRW-BTC").unwrap();
        assert_eq!(position.stop_loss_price, dec!(49000));
        assert_eq!(f.notifier.count(NotificationKind::Trade), 1);

        // Price drops to 40,000: the position is liquidated at a 20% loss.
        shared.trading_pass().await;
        assert_eq!(f.control.book().read().await.ledger().count(), 0);
        assert!(f.notifier.any(NotificationKind::Emergency, "Stop-loss"));

        // The realized loss breaches the daily limit on the next pass.
        shared.trading_pass().await;
        assert_eq!(f.control.state(), RunState::Stopped);
        assert!(matches!(
            f.control.halt_reason().await,
            Some(HaltReason::LossLimit { .. })
        ));
        assert!(f.notifier.any(NotificationKind::Emergency, "loss limit"));
    }

    #[tokio::test]
    async fn test_symbol_errors_are_isolated() {
        let f = fixture(vec![
            tick("KRW-BTC", dec!(50000), SignalAction::Buy),
            tick("KRW-ETH", dec!(2000), SignalAction::Buy),
        ]);
        f.exchange
            .fail_next_order(ExchangeError::Network("connection reset".to_string()))
            .await;
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);

        shared.trading_pass().await;

        let book = f.control.book().read().await;
        assert!(!book.ledger().contains("KRW-BTC"));
        assert!(book.ledger().contains("KRW-ETH"));
        assert_eq!(f.control.state(), RunState::Running);
    }

    #[tokio::test]
    async fn test_sell_signal_without_position_is_ignored() {
        let f = fixture(vec![tick("KRW-BTC", dec!(50000), SignalAction::Sell)]);
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);

        shared.trading_pass().await;
        assert_eq!(f.control.status().await.book.risk, RiskState::default());
        assert!(f.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_advisory_veto_skips_buy() {
        let f = fixture_with(
            dec!(1000000),
            RiskConfig::default(),
            vec![tick("KRW-BTC", dec!(50000), SignalAction::Buy)],
            Some(Arc::new(sell_advice(0.9))),
        );
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);

        shared.trading_pass().await;
        assert_eq!(f.control.book().read().await.ledger().count(), 0);
    }

    #[tokio::test]
    async fn test_weak_or_failing_advisory_does_not_block() {
        let f = fixture_with(
            dec!(1000000),
            RiskConfig::default(),
            vec![tick("KRW-BTC", dec!(50000), SignalAction::Buy)],
            Some(Arc::new(sell_advice(0.5))),
        );
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);
        shared.trading_pass().await;
        assert_eq!(f.control.book().read().await.ledger().count(), 1);

        let failing: Arc<dyn AdvisoryService> = Arc::new(FixedAdvisory(Err(
            AdvisoryError::Unavailable("timeout".to_string()),
        )));
        let f = fixture_with(
            dec!(1000000),
            RiskConfig::default(),
            vec![tick("KRW-BTC", dec!(50000), SignalAction::Buy)],
            Some(failing),
        );
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);
        shared.trading_pass().await;
        assert_eq!(f.control.book().read().await.ledger().count(), 1);
    }

    #[tokio::test]
    async fn test_advisory_pass_forwards_alerts() {
        let f = fixture(vec![tick("KRW-ETH", dec!(2000), SignalAction::Buy)]);
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);
        shared.trading_pass().await;

        shared.advisory_pass(&sell_advice(0.9)).await;
        assert!(f.notifier.any(NotificationKind::Advisory, "strong sell"));
        assert!(f.notifier.any(NotificationKind::Emergency, "high risk"));
        // Alerts never trade.
        assert_eq!(f.control.book().read().await.ledger().count(), 1);
    }

    #[test]
    fn test_trading_day_boundary() {
        // 08:59 KST still belongs to the previous trading day.
        let before = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(trading_day(before, 9), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(trading_day(after, 9), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        // Midnight KST reset
        assert_eq!(trading_day(before, 0), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[tokio::test]
    async fn test_day_rollover_resets_daily_state() {
        let f = fixture(vec![tick("KRW-BTC", dec!(50000), SignalAction::Buy)]);
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);
        shared.trading_pass().await;
        assert_eq!(f.control.status().await.book.risk.daily_trade_count, 1);

        let today = Utc::now();
        shared.roll_trading_day(today).await;
        assert_eq!(f.control.status().await.book.risk.daily_trade_count, 1);

        shared.roll_trading_day(today + ChronoDuration::days(1)).await;
        let status = f.control.status().await;
        assert_eq!(status.book.risk, RiskState::default());
        assert_eq!(status.book.positions.len(), 1);
    }

    #[tokio::test]
    async fn test_workers_trade_report_and_drain() {
        let f = fixture(vec![tick("KRW-BTC", dec!(50000), SignalAction::Buy)]);
        f.control.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(f.control.stop().await);

        assert_eq!(f.control.book().read().await.ledger().count(), 1);
        assert_eq!(f.notifier.count(NotificationKind::Trade), 1);
        assert!(f.notifier.any(NotificationKind::Report, "KRW-BTC"));

        let status = f.control.status().await;
        assert_eq!(status.state, RunState::Stopped);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "stopped");
    }

    #[tokio::test]
    async fn test_stop_gives_up_on_stuck_worker() {
        let paper = Arc::new(PaperExchange::new(dec!(1000000)).with_price("KRW-BTC", dec!(50000)));
        let exchange = Arc::new(GatedExchange::gating_buys(paper.clone()));
        let feed = Arc::new(
            ReplayFeed::new(vec![tick("KRW-BTC", dec!(50000), SignalAction::Buy)])
                .with_exchange(paper),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let config = ControlConfig {
            trading_interval: Duration::from_millis(20),
            advisory_interval: Duration::from_millis(20),
            report_interval: Duration::from_millis(20),
            drain_timeout: Duration::from_millis(100),
            ..ControlConfig::default()
        };
        let control = ControlLoop::new(
            config,
            SharedBook::new(RiskConfig::default()),
            exchange.clone(),
            feed,
            notifier.clone(),
            None,
        );

        control.start().await.unwrap();
        // The buy is never released, so the trading worker cannot observe shutdown.
        exchange.entered.notified().await;

        let started = tokio::time::Instant::now();
        assert!(control.stop().await);
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(1));
        assert_eq!(control.state(), RunState::Stopped);
        assert_eq!(control.book().read().await.ledger().count(), 0);
        assert!(notifier.any(NotificationKind::Info, "Trading stopped"));
    }

    #[tokio::test]
    async fn test_paused_loop_does_not_trade() {
        let ticks = (0..4)
            .map(|_| tick("KRW-BTC", dec!(50000), SignalAction::Buy))
            .collect();
        let f = fixture(ticks);
        f.control.start().await.unwrap();
        f.control.pause().unwrap();
        // Let a pass that was already in flight finish.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let trades_at_pause = f.control.book().read().await.risk().state().daily_trade_count;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            f.control.book().read().await.risk().state().daily_trade_count,
            trades_at_pause
        );
        assert!(trades_at_pause <= 1);

        f.control.resume().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(f.control.book().read().await.risk().state().daily_trade_count > trades_at_pause);
        assert!(f.control.stop().await);
    }

    #[tokio::test]
    async fn test_emergency_sell_all_notifies() {
        let f = fixture(vec![
            tick("KRW-BTC", dec!(50000), SignalAction::Buy),
            tick("KRW-ETH", dec!(2000), SignalAction::Buy),
        ]);
        let shared = f.control.shared.clone();
        shared.set_state(RunState::Running);
        shared.trading_pass().await;

        let report = f.control.emergency_sell_all().await;
        assert_eq!(report.trades.len(), 2);
        assert!(report.is_clean());
        assert_eq!(f.control.book().read().await.ledger().count(), 0);
        assert!(f.notifier.any(NotificationKind::Emergency, "2 sold, 0 failed"));
    }
}
