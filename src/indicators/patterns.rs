use crate::models::Candle;

/// Default proximity for a Bollinger band touch (0.2%)
pub const DEFAULT_BAND_PROXIMITY: f64 = 0.002;

/// Which Bollinger band the price is touching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandTouch {
    Upper,
    Lower,
}

struct CandleShape {
    body: f64,
    upper_wick: f64,
    lower_wick: f64,
}

fn shape(candle: &Candle) -> CandleShape {
    let top = candle.open.max(candle.close);
    let bottom = candle.open.min(candle.close);
    CandleShape {
        body: (candle.close - candle.open).abs(),
        upper_wick: candle.high - top,
        lower_wick: bottom - candle.low,
    }
}

/// Hammer: long lower wick (≥ 2× body), short upper wick (≤ 0.5× body).
/// A doji (zero body) is never a hammer.
pub fn is_hammer(candle: &Candle) -> bool {
    let s = shape(candle);
    if s.body == 0.0 {
        return false;
    }
    s.lower_wick >= 2.0 * s.body && s.upper_wick <= 0.5 * s.body
}

/// Shooting star: long upper wick (≥ 2× body), short lower wick (≤ 0.5× body).
/// A doji (zero body) is never a shooting star.
pub fn is_shooting_star(candle: &Candle) -> bool {
    let s = shape(candle);
    if s.body == 0.0 {
        return false;
    }
    s.upper_wick >= 2.0 * s.body && s.lower_wick <= 0.5 * s.body
}

/// Check whether price sits within `proximity` of a band. Upper wins when both match.
pub fn bollinger_touch(price: f64, upper: f64, lower: f64, proximity: f64) -> Option<BandTouch> {
    if price >= upper * (1.0 - proximity) {
        return Some(BandTouch::Upper);
    }
    if price <= lower * (1.0 + proximity) {
        return Some(BandTouch::Lower);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            instrument: "TEST".to_string(),
            minute: Utc::now(),
            open,
            high,
            low,
            close,
            tick_count: 1,
        }
    }

    #[test]
    fn test_hammer() {
        // body 1, lower wick 3, upper wick 0.2
        let c = candle(100.0, 101.2, 97.0, 101.0);
        assert!(is_hammer(&c));
        assert!(!is_shooting_star(&c));
    }

    #[test]
    fn test_bearish_hammer_still_counts() {
        // body 1 (close below open), lower wick 2, upper wick 0.5
        let c = candle(101.0, 101.5, 98.0, 100.0);
        assert!(is_hammer(&c));
    }

    #[test]
    fn test_shooting_star() {
        // body 1, upper wick 3, lower wick 0.3
        let c = candle(101.0, 104.0, 99.7, 100.0);
        assert!(is_shooting_star(&c));
        assert!(!is_hammer(&c));
    }

    #[test]
    fn test_doji_matches_neither() {
        let c = candle(100.0, 105.0, 95.0, 100.0);
        assert!(!is_hammer(&c));
        assert!(!is_shooting_star(&c));
    }

    #[test]
    fn test_upper_wick_too_long_for_hammer() {
        // body 1, lower wick 3, upper wick 0.8
        let c = candle(100.0, 101.8, 97.0, 101.0);
        assert!(!is_hammer(&c));
    }

    #[test]
    fn test_bollinger_touch() {
        assert_eq!(
            bollinger_touch(109.9, 110.0, 90.0, DEFAULT_BAND_PROXIMITY),
            Some(BandTouch::Upper)
        );
        assert_eq!(
            bollinger_touch(90.1, 110.0, 90.0, DEFAULT_BAND_PROXIMITY),
            Some(BandTouch::Lower)
        );
        assert_eq!(bollinger_touch(100.0, 110.0, 90.0, DEFAULT_BAND_PROXIMITY), None);
    }

    #[test]
    fn test_bollinger_touch_prefers_upper() {
        // Bands collapsed onto the price: both checks match
        assert_eq!(
            bollinger_touch(100.0, 100.0, 100.0, DEFAULT_BAND_PROXIMITY),
            Some(BandTouch::Upper)
        );
    }
}
