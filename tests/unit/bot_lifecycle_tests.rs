use async_trait::async_trait;
use liquidity_mirror::{
    Alerter, Balance, BookOutcome, BookUpdate, BotState, Diagnostics, DummyVenue, HistoryConfig,
    Level, MirrorBot, MirrorConfig, MirrorError, Order, Side, SubscriptionId, Venue, VenueError,
    VenueListener,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingAlerter {
    messages: Mutex<Vec<String>>,
}

impl Alerter for RecordingAlerter {
    fn alert(&self, message: &str, _diagnostics: &Diagnostics) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn rich() -> Balance {
    Balance::new(dec!(1_000_000), dec!(1_000_000_000))
}

fn venues() -> (Arc<DummyVenue>, Arc<DummyVenue>) {
    (
        Arc::new(DummyVenue::new("origin").with_balance(rich())),
        Arc::new(DummyVenue::new("remote").with_balance(rich())),
    )
}

fn two_sided(bid: Decimal, ask: Decimal) -> BookUpdate {
    BookUpdate::Sided {
        bids: vec![Level::new(Decimal::ONE, bid).unwrap()],
        asks: vec![Level::new(Decimal::ONE, ask).unwrap()],
    }
}

/// Venue whose placements take `delay` to complete
struct SlowVenue {
    inner: Arc<DummyVenue>,
    delay: Duration,
}

#[async_trait]
impl Venue for SlowVenue {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn ready(&self) -> Result<(), VenueError> {
        self.inner.ready().await
    }

    async fn cleanup(&self) -> Result<(), VenueError> {
        self.inner.cleanup().await
    }

    fn orders(&self) -> Vec<Order> {
        self.inner.orders()
    }

    fn balance(&self) -> Balance {
        self.inner.balance()
    }

    async fn place_orders(&self, orders: Vec<Order>) -> Result<Vec<Order>, VenueError> {
        tokio::time::sleep(self.delay).await;
        self.inner.place_orders(orders).await
    }

    async fn cancel_orders(&self, orders: Vec<Order>) -> Result<(), VenueError> {
        self.inner.cancel_orders(orders).await
    }

    fn subscribe(&self, listener: VenueListener) -> SubscriptionId {
        self.inner.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }
}

fn config() -> MirrorConfig {
    MirrorConfig::new(dec!(1.1)).with_padding(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_when_idle_fails_without_side_effects() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin.clone(), remote.clone(), config()).unwrap();

        let result = bot.stop().await;
        assert!(matches!(
            result,
            Err(MirrorError::InvalidState {
                actual: BotState::Idle,
                ..
            })
        ));
        assert!(matches!(bot.reset().await, Err(MirrorError::InvalidState { .. })));
        assert!(origin.cancelled().is_empty());
        assert!(!origin.is_primed());
        assert!(!remote.is_primed());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin.clone(), remote, config()).unwrap();

        bot.start().await.unwrap();
        assert_eq!(bot.state(), BotState::Ready);
        assert!(matches!(
            bot.start().await,
            Err(MirrorError::InvalidState {
                actual: BotState::Ready,
                ..
            })
        ));
        assert_eq!(bot.state(), BotState::Ready);
        assert_eq!(origin.subscriber_count(), 1);

        bot.stop().await.unwrap();
        assert_eq!(bot.state(), BotState::Idle);
        assert!(!origin.is_polling());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin, remote, config()).unwrap();
        bot.start().await.unwrap();
        bot.stop().await.unwrap();
        bot.start().await.unwrap();
        assert_eq!(bot.state(), BotState::Ready);
        bot.stop().await.unwrap();
    }

    #[test]
    fn test_invalid_config_rejected_before_start() {
        let (origin, remote) = venues();
        let result = MirrorBot::new(origin, remote, MirrorConfig::new(Decimal::ZERO));
        assert!(matches!(result, Err(MirrorError::Config(_))));
    }

    #[tokio::test]
    async fn test_ready_failure_aborts_startup() {
        let (origin, remote) = venues();
        remote.fail_ready(true);
        let alerter = Arc::new(RecordingAlerter::default());
        let bot =
            MirrorBot::with_alerter(origin.clone(), remote, config(), alerter.clone()).unwrap();

        let result = bot.start().await;
        assert!(matches!(
            result,
            Err(MirrorError::Venue(VenueError::Transport { .. }))
        ));
        assert_eq!(bot.state(), BotState::Idle);
        assert_eq!(origin.subscriber_count(), 0);
        assert_eq!(alerter.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_cancels_leftover_origin_orders() {
        let leftover = Order::parse(Side::Ask, "1", "100").unwrap();
        let origin = Arc::new(
            DummyVenue::new("origin")
                .with_balance(rich())
                .with_orders(vec![leftover]),
        );
        let remote = Arc::new(DummyVenue::new("remote").with_balance(rich()));
        let bot = MirrorBot::new(origin.clone(), remote, config()).unwrap();

        bot.start().await.unwrap();
        assert!(origin.orders().is_empty());
        assert_eq!(origin.cancelled().len(), 1);
        bot.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_only_mode() {
        let origin = Arc::new(
            DummyVenue::new("origin")
                .with_balance(rich())
                .with_orders(vec![Order::parse(Side::Bid, "1", "90").unwrap()]),
        );
        let remote = Arc::new(
            DummyVenue::new("remote")
                .with_balance(rich())
                .with_orders(vec![Order::parse(Side::Bid, "2", "50").unwrap()]),
        );
        let bot = MirrorBot::new(
            origin.clone(),
            remote.clone(),
            config().with_reset_only(true),
        )
        .unwrap();

        bot.start().await.unwrap();
        assert_eq!(bot.state(), BotState::Idle);
        assert!(origin.orders().is_empty());
        assert_eq!(remote.orders().len(), 1);
        assert_eq!(bot.stats().num_pending, 1);
        assert_eq!(bot.stats().value_pending, dec!(100));
        assert_eq!(origin.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_volatility_breach_aborts() {
        let (origin, remote) = venues();
        let history = HistoryConfig {
            capacity: 10,
            interval_ms: 0,
            rolling_num: 1,
        };
        let alerter = Arc::new(RecordingAlerter::default());
        let bot = MirrorBot::with_alerter(
            origin.clone(),
            remote,
            config().with_max_volatility(dec!(0.1)).with_history(history),
            alerter.clone(),
        )
        .unwrap();
        bot.start().await.unwrap();

        bot.handle_remote_orderbook(two_sided(dec!(590), dec!(610)))
            .await
            .unwrap();
        bot.handle_remote_orderbook(two_sided(dec!(620), dec!(640)))
            .await
            .unwrap();
        assert_eq!(origin.orders().len(), 2);

        let result = bot
            .handle_remote_orderbook(two_sided(dec!(890), dec!(910)))
            .await;
        assert!(matches!(result, Err(MirrorError::VolatilityBreach { .. })));
        assert_eq!(bot.state(), BotState::Idle);
        assert!(origin.orders().is_empty());
        assert_eq!(bot.access_lock().using(), 0);
        assert_eq!(alerter.messages.lock().unwrap().len(), 1);
        assert_eq!(bot.diagnostics().mean, Some(dec!(900)));
    }

    #[tokio::test]
    async fn test_empty_book_never_trips_breaker() {
        let (origin, remote) = venues();
        let history = HistoryConfig {
            capacity: 10,
            interval_ms: 0,
            rolling_num: 1,
        };
        let bot = MirrorBot::new(
            origin,
            remote,
            config()
                .with_max_volatility(Decimal::ZERO)
                .with_history(history),
        )
        .unwrap();
        bot.start().await.unwrap();

        bot.handle_remote_orderbook(two_sided(dec!(590), dec!(610)))
            .await
            .unwrap();
        let outcome = bot
            .handle_remote_orderbook(BookUpdate::from(Vec::new()))
            .await
            .unwrap();
        assert!(matches!(outcome, BookOutcome::Applied(_)));

        let one_sided = BookUpdate::Sided {
            bids: vec![Level::new(Decimal::ONE, dec!(10)).unwrap()],
            asks: vec![],
        };
        assert!(bot.handle_remote_orderbook(one_sided).await.is_ok());
        assert_eq!(bot.state(), BotState::Ready);
        bot.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_book_dropped_while_locked() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin.clone(), remote, config()).unwrap();
        bot.start().await.unwrap();

        {
            let _held = bot.access_lock().try_exclusive().unwrap();
            let outcome = bot
                .handle_remote_orderbook(two_sided(dec!(590), dec!(610)))
                .await
                .unwrap();
            assert_eq!(outcome, BookOutcome::Discarded);
            assert!(origin.orders().is_empty());
        }

        let outcome = bot
            .handle_remote_orderbook(two_sided(dec!(590), dec!(610)))
            .await
            .unwrap();
        assert!(matches!(outcome, BookOutcome::Applied(_)));
        bot.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_book_ignored_when_not_ready() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin.clone(), remote, config()).unwrap();
        let outcome = bot
            .handle_remote_orderbook(two_sided(dec!(590), dec!(610)))
            .await
            .unwrap();
        assert_eq!(outcome, BookOutcome::Ignored);
        assert!(origin.placed().is_empty());
    }

    #[tokio::test]
    async fn test_placement_failure_aborts() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin.clone(), remote, config()).unwrap();
        bot.start().await.unwrap();
        origin.fail_place(true);

        let result = bot
            .handle_remote_orderbook(two_sided(dec!(590), dec!(610)))
            .await;
        assert!(matches!(
            result,
            Err(MirrorError::Venue(VenueError::Rejected { .. }))
        ));
        assert_eq!(bot.state(), BotState::Idle);
        assert_eq!(bot.access_lock().using(), 0);
    }

    #[tokio::test]
    async fn test_hedge_failure_aborts() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin, remote.clone(), config()).unwrap();
        bot.start().await.unwrap();
        remote.fail_place(true);

        let fill = Order::parse(Side::Bid, "1", "100").unwrap();
        assert!(bot.handle_origin_trade(fill).await.is_err());
        assert_eq!(bot.state(), BotState::Idle);
        assert_eq!(bot.stats().num_pending, 0);
    }

    #[tokio::test]
    async fn test_stop_after_threshold() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin, remote.clone(), config().with_stop_after(2)).unwrap();
        bot.start().await.unwrap();

        let fill = Order::parse(Side::Ask, "1", "110").unwrap();
        bot.handle_origin_trade(fill.clone()).await.unwrap();
        assert_eq!(bot.state(), BotState::Ready);

        bot.handle_remote_trade(Order::parse(Side::Bid, "1", "100").unwrap());
        assert_eq!(bot.stats().num_matched, 1);
        assert_eq!(bot.stats().num_pending, 0);

        bot.handle_origin_trade(fill).await.unwrap();
        assert_eq!(bot.state(), BotState::Idle);
        assert_eq!(bot.stats().total(), 2);
        assert_eq!(remote.placed().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_waits_for_inflight_reconciliation() {
        let (origin, remote) = venues();
        let slow = Arc::new(SlowVenue {
            inner: origin.clone(),
            delay: Duration::from_millis(100),
        });
        let bot = MirrorBot::new(slow, remote, config()).unwrap();
        bot.start().await.unwrap();

        let book = BookUpdate::Sided {
            bids: vec![Level::new(dec!(2), dec!(500)).unwrap()],
            asks: vec![],
        };
        let reconciling = {
            let bot = bot.clone();
            tokio::spawn(async move { bot.handle_remote_orderbook(book).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(bot.access_lock().using() > 0);

        bot.reset().await.unwrap();
        assert!(origin.orders().is_empty());
        assert_eq!(bot.access_lock().using(), 0);

        let outcome = reconciling.await.unwrap().unwrap();
        assert!(matches!(outcome, BookOutcome::Applied(_)));
        assert!(origin.orders().is_empty());
        bot.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_filled_hedges_are_forgotten_on_reset() {
        let (origin, remote) = venues();
        let bot = MirrorBot::new(origin, remote.clone(), config()).unwrap();
        bot.start().await.unwrap();

        let fill = Order::parse(Side::Ask, "1", "110").unwrap();
        bot.handle_origin_trade(fill).await.unwrap();
        assert_eq!(bot.tracked_hedges(), 1);

        bot.reset().await.unwrap();
        assert_eq!(bot.tracked_hedges(), 1);
        assert_eq!(bot.stats().num_pending, 1);

        let hedge = remote.orders().pop().unwrap();
        let id = hedge.id().unwrap().to_string();
        remote.fill(&id, hedge.quantity()).unwrap();

        bot.reset().await.unwrap();
        assert_eq!(bot.tracked_hedges(), 0);
        bot.stop().await.unwrap();
    }
}
