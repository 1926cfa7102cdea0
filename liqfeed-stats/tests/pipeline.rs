use liqfeed_data::{
    ExchangeId, LiquidationEvent, Side,
    exchange::{Decoded, decode},
    normalise::Normaliser,
};
use liqfeed_stats::{
    AggregateState, Engine, EngineConfig, Update, achievement::AchievementId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

const BINANCE_BTC_SELL: &str = r#"{
    "e":"forceOrder","E":1700000000100,
    "o":{"s":"BTCUSDT","S":"SELL","o":"LIMIT","f":"IOC","q":"0.5","p":"59000",
         "ap":"60000","X":"FILLED","l":"0.5","z":"0.5","T":1700000000000}
}"#;

const OKX_ETH_LONG: &str = r#"{
    "arg":{"channel":"liquidation-orders","instType":"SWAP"},
    "data":[{
        "instId":"ETH-USDT-SWAP","instFamily":"ETH-USDT","instType":"SWAP","uly":"ETH-USDT",
        "details":[{"bkLoss":"0","bkPx":"3000","ccy":"","posSide":"long","side":"sell","sz":"2","ts":"1700000000000"}]
    }]
}"#;

const BYBIT_MISSING_PRICE: &str = r#"{
    "topic":"allLiquidation.BTCUSDT","type":"snapshot","ts":1700000000000,
    "data":[{"T":1700000000000,"s":"BTCUSDT","S":"Buy","v":"1"}]
}"#;

fn events(exchange: ExchangeId, frame: &str) -> Vec<LiquidationEvent> {
    let normaliser = Normaliser::default();
    match decode(exchange, frame) {
        Ok(Decoded::Liquidations(partials)) => partials
            .into_iter()
            .map(|partial| normaliser.normalise(exchange, partial).unwrap())
            .collect(),
        Ok(Decoded::Control(_)) | Err(_) => Vec::new(),
    }
}

fn binance(side: &str, quantity: &str, price: &str, time_ms: u64) -> LiquidationEvent {
    let frame = format!(
        r#"{{"e":"forceOrder","E":{time_ms},"o":{{"s":"BTCUSDT","S":"{side}","o":"LIMIT","q":"{quantity}","ap":"{price}","X":"FILLED","T":{time_ms}}}}}"#
    );
    let mut events = events(ExchangeId::Binance, &frame);
    assert_eq!(events.len(), 1);
    events.remove(0)
}

fn apply_all(state: &mut AggregateState, events: &[LiquidationEvent]) -> Vec<Update> {
    events.iter().map(|event| state.apply(event)).collect()
}

#[test]
fn test_binance_frame_to_state() {
    let mut state = AggregateState::default();
    let events = events(ExchangeId::Binance, BINANCE_BTC_SELL);
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.symbol(), "BTCUSDT");
    assert_eq!(event.side(), Side::Sell);
    assert_eq!(event.quantity(), dec!(0.5));
    assert_eq!(event.price(), dec!(60000));
    assert_eq!(event.value(), dec!(30000));
    assert_eq!(event.time().timestamp_millis(), 1_700_000_000_000);

    state.apply(event);
    assert_eq!(state.total_value(), dec!(30000));
    assert_eq!(state.counters().sell_count, 1);
}

#[test]
fn test_okx_long_liquidation_is_forced_sell() {
    let events = events(ExchangeId::Okx, OKX_ETH_LONG);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].symbol(), "ETH-USDT-SWAP");
    assert_eq!(events[0].side(), Side::Sell);
    assert_eq!(events[0].value(), dec!(6000));
}

#[test]
fn test_malformed_bybit_element_leaves_state_unchanged() {
    let mut state = AggregateState::default();
    state.apply(&binance("SELL", "1", "100", 1_700_000_000_000));
    let before = state.clone();

    for event in events(ExchangeId::Bybit, BYBIT_MISSING_PRICE) {
        state.apply(&event);
    }

    assert_eq!(state, before);
}

#[test]
fn test_garbage_frames_produce_no_events() {
    for exchange in ExchangeId::ALL {
        for frame in ["", "not json", "{}", "[]", r#"{"foo":1}"#, "null"] {
            assert!(events(exchange, frame).is_empty(), "{exchange} {frame:?} failed");
        }
    }
}

#[test]
fn test_totals_independent_of_history_capacity() {
    let events = (0..25)
        .map(|index| {
            let side = if index % 3 == 0 { "BUY" } else { "SELL" };
            binance(side, "0.1", &format!("{}", 1000 + index), 1_700_000_000_000 + index)
        })
        .collect::<Vec<_>>();

    let expected_total: Decimal = events.iter().map(LiquidationEvent::value).sum();

    for capacity in [1, 5, 24, 25, 100] {
        let mut state = AggregateState::new(capacity);
        apply_all(&mut state, &events);

        assert_eq!(state.total_value(), expected_total, "capacity {capacity} failed");
        assert_eq!(state.counters().total(), 25, "capacity {capacity} failed");
        assert_eq!(state.counters().buy_count, 9, "capacity {capacity} failed");
        assert_eq!(state.history().len(), capacity.min(25), "capacity {capacity} failed");
    }
}

#[test]
fn test_history_evicts_first_arrived() {
    let capacity = 4;
    let mut state = AggregateState::new(capacity);

    // Later arrivals carry earlier timestamps: eviction follows arrival, not time
    let events = (0..=capacity as u64)
        .map(|index| binance("SELL", "1", &format!("{}", 10 + index), 1_700_000_100_000 - index))
        .collect::<Vec<_>>();
    let updates = apply_all(&mut state, &events);

    assert_eq!(updates.last().unwrap().evicted.as_ref(), Some(&events[0]));
    assert_eq!(
        state.history().collect::<Vec<_>>(),
        events[1..].iter().collect::<Vec<_>>()
    );
}

#[test]
fn test_high_score_is_non_decreasing() {
    let mut state = AggregateState::default();
    let mut previous = state.high_score();

    for index in 0..50 {
        let price = format!("{}", 100 * (index % 7) + 1);
        state.apply(&binance("BUY", "0.01", &price, 1_700_000_000_000 + index));
        assert!(state.high_score() >= previous);
        assert_eq!(state.high_score(), state.total_value());
        previous = state.high_score();
    }
}

#[test]
fn test_whale_hunter_unlocks_once() {
    let mut state = AggregateState::default();

    let below = binance("SELL", "1", "99999.99", 1_700_000_000_000);
    assert!(state.apply(&below).unlocked.is_empty());
    assert!(!state.achievements().is_unlocked(AchievementId::WhaleHunter));

    let whale = binance("SELL", "2", "50000", 1_700_000_001_000);
    assert_eq!(state.apply(&whale).unlocked, vec![AchievementId::WhaleHunter]);

    let second_whale = binance("SELL", "10", "50000", 1_700_000_002_000);
    let update = state.apply(&second_whale);
    assert!(!update.unlocked.contains(&AchievementId::WhaleHunter));
    assert_eq!(
        state.achievements().unlocked_at(AchievementId::WhaleHunter),
        Some(whale.time())
    );
}

#[test]
fn test_balanced_view_unlocks_when_counts_meet_at_ten() {
    let mut state = AggregateState::default();
    let mut time = 1_700_000_000_000;
    let mut next = |side: &str| {
        time += 1;
        binance(side, "1", "1", time)
    };

    for _ in 0..9 {
        let updates = apply_all(&mut state, &[next("BUY"), next("SELL")]);
        assert!(updates.iter().all(|update| update.unlocked.is_empty()));
    }
    assert_eq!(state.counters().buy_count, 9);
    assert_eq!(state.counters().sell_count, 9);

    // 9/9 -> 10/9
    let update = state.apply(&next("BUY"));
    assert!(update.unlocked.is_empty());
    assert!(!state.achievements().is_unlocked(AchievementId::BalancedView));

    // 10/9 -> 10/10
    let sell = next("SELL");
    let update = state.apply(&sell);
    assert_eq!(update.unlocked, vec![AchievementId::BalancedView]);
    assert_eq!(
        state.achievements().unlocked_at(AchievementId::BalancedView),
        Some(sell.time())
    );

    // Staying balanced never unlocks again
    let update = state.apply(&next("BUY"));
    assert!(update.unlocked.is_empty());
}

#[tokio::test]
async fn test_engine_serialises_events_from_every_exchange() {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (engine, handle) = Engine::new(EngineConfig::default(), event_rx);
    let task = tokio::spawn(engine.run());

    let producers = [
        (ExchangeId::Binance, BINANCE_BTC_SELL),
        (ExchangeId::Okx, OKX_ETH_LONG),
        (ExchangeId::Bybit, BYBIT_MISSING_PRICE),
    ]
    .into_iter()
    .map(|(exchange, frame)| {
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            for event in events(exchange, frame) {
                event_tx.send(event).unwrap();
            }
        })
    })
    .collect::<Vec<_>>();

    for producer in producers {
        producer.await.unwrap();
    }
    drop(event_tx);

    let state = task.await.unwrap();
    assert_eq!(state.total_value(), dec!(36000));
    assert_eq!(state.counters().sell_count, 2);
    assert_eq!(handle.history().len(), 2);
}
