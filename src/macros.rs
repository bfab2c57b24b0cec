#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build a `Vec<Fragment>` from written fragments: `fragments!["hello", "*name"]`.
#[macro_export]
macro_rules! fragments {
    ( $($frag:expr),* $(,)? ) => {
        vec![ $($crate::Fragment::parse($frag)),* ]
    };
}

/// Build a `PatternTemplateSource`.
///
/// `score` defaults to `1.0` and `source` defaults to the rule name.
#[macro_export]
macro_rules! rule {
    (
        name: $name:expr,
        pattern: [ $($pat:expr),* $(,)? ],
        template: [ $($tpl:expr),* $(,)? ]
        $(, score: $score:expr)?
        $(, source: $source:expr)?
        $(,)?
    ) => {{
        let score = None::<f64> $(.or(Some($score)))? .unwrap_or(1.0);
        let source = None::<&str> $(.or(Some($source)))? .unwrap_or($name);
        $crate::PatternTemplateSource::new(
            $crate::Context::new($crate::fragments![ $($pat),* ]),
            $crate::Context::new($crate::fragments![ $($tpl),* ]),
            score,
            source,
        )
        .named($name)
    }};
}
