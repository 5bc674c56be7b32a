/// Builds a [`Record`](crate::Record) from `key => value` pairs.
///
/// ```
/// use rxstore::record;
///
/// let state = record! { "num" => 1, "other" => 2 };
/// assert_eq!(state["num"], 1);
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        <$crate::Record<_> as ::core::iter::FromIterator<_>>::from_iter([
            $((::std::string::String::from($key), $value)),+
        ])
    };
}

/// Builds the named reducer list taken by [`combine_reducers`](crate::combine_reducers) from
/// `key => reducer function` pairs.
#[macro_export]
macro_rules! reducers {
    ($($key:expr => $reducer:expr),+ $(,)?) => {
        ::std::vec![
            $((::std::string::String::from($key), $crate::Reducer::new($reducer))),+
        ]
    };
}

/// Builds the named selector list taken by [`assign_selectors`](crate::assign_selectors).
#[macro_export]
macro_rules! selectors {
    ($($key:expr => $selector:expr),+ $(,)?) => {
        ::std::vec![
            $((::std::string::String::from($key), $selector)),+
        ]
    };
}
