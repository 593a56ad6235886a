use std::time::Duration;

use indexmap::IndexMap;

use crate::action::AmiAction;

/// Where the originated channel goes once answered.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Dialplan {
        context: String,
        exten: String,
        priority: String,
    },
    Application {
        application: String,
        data: Option<String>,
    },
}

/// `Originate` action builder.
///
/// A call needs a channel to dial plus either a dialplan location
/// (context, extension, priority) or an application to run.
///
/// ```
/// use asterisk_ami_tokio::Originate;
/// use std::time::Duration;
///
/// let originate = Originate::new("SIP/200")
///     .dialplan("from-internal", "100", "1")
///     .caller_id("200")
///     .timeout(Duration::from_secs(30))
///     .run_async(true);
/// assert!(originate.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Originate {
    channel: String,
    context: Option<String>,
    exten: Option<String>,
    priority: Option<String>,
    application: Option<String>,
    data: Option<String>,
    timeout: Option<Duration>,
    caller_id: Option<String>,
    account: Option<String>,
    variables: IndexMap<String, String>,
    run_async: bool,
}

impl Originate {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            context: None,
            exten: None,
            priority: None,
            application: None,
            data: None,
            timeout: None,
            caller_id: None,
            account: None,
            variables: IndexMap::new(),
            run_async: false,
        }
    }

    /// Continue in the dialplan at `context,exten,priority`.
    pub fn dialplan(
        mut self,
        context: impl Into<String>,
        exten: impl Into<String>,
        priority: impl Into<String>,
    ) -> Self {
        self.context = Some(context.into());
        self.exten = Some(exten.into());
        self.priority = Some(priority.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn exten(mut self, exten: impl Into<String>) -> Self {
        self.exten = Some(exten.into());
        self
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Run `application(data)` instead of entering the dialplan.
    pub fn application(mut self, application: impl Into<String>, data: Option<&str>) -> Self {
        self.application = Some(application.into());
        self.data = data.map(str::to_string);
        self
    }

    /// How long to wait for the channel to answer. Sent in milliseconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Set a channel variable. Later values for the same name replace earlier ones.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables
            .insert(name.into(), value.into());
        self
    }

    /// Respond as soon as the call is queued instead of after it is answered.
    ///
    /// The outcome then arrives as an `OriginateResponse` event carrying the
    /// same `ActionID`.
    pub fn run_async(mut self, run_async: bool) -> Self {
        self.run_async = run_async;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_async(&self) -> bool {
        self.run_async
    }

    pub fn variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    fn target(&self) -> Result<Target, OriginateError> {
        match (&self.exten, &self.application) {
            (Some(_), Some(_)) => Err(OriginateError::ConflictingTarget),
            (None, None) => Err(OriginateError::MissingTarget),
            (Some(exten), None) => {
                let context = self
                    .context
                    .clone()
                    .ok_or(OriginateError::MissingContext)?;
                Ok(Target::Dialplan {
                    context,
                    exten: exten.clone(),
                    priority: self
                        .priority
                        .clone()
                        .unwrap_or_else(|| "1".to_string()),
                })
            }
            (None, Some(application)) => Ok(Target::Application {
                application: application.clone(),
                data: self
                    .data
                    .clone(),
            }),
        }
    }

    /// Check the builder describes a call Asterisk will accept.
    pub fn validate(&self) -> Result<(), OriginateError> {
        if self
            .channel
            .trim()
            .is_empty()
        {
            return Err(OriginateError::EmptyChannel);
        }
        self.target()
            .map(|_| ())
    }

    /// Validate and build the action.
    pub fn to_action(&self) -> Result<AmiAction, OriginateError> {
        self.validate()?;

        let mut action = AmiAction::new("Originate").header("Channel", self.channel.as_str());
        action = match self.target()? {
            Target::Dialplan {
                context,
                exten,
                priority,
            } => action
                .header("Context", context)
                .header("Exten", exten)
                .header("Priority", priority),
            Target::Application { application, data } => action
                .header("Application", application)
                .opt_header("Data", data),
        };

        action = action
            .opt_header(
                "Timeout",
                self.timeout
                    .map(|t| t.as_millis().to_string()),
            )
            .opt_header("CallerID", self.caller_id.clone())
            .opt_header("Account", self.account.clone());

        for (name, value) in &self.variables {
            action = action.header("Variable", format!("{}={}", name, value));
        }

        if self.run_async {
            action = action.header("Async", "true");
        }

        Ok(action)
    }
}

impl TryFrom<Originate> for AmiAction {
    type Error = OriginateError;

    fn try_from(originate: Originate) -> Result<Self, Self::Error> {
        originate.to_action()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginateError {
    #[error("channel must not be empty")]
    EmptyChannel,
    #[error("either an extension or an application is required")]
    MissingTarget,
    #[error("extension and application are mutually exclusive")]
    ConflictingTarget,
    #[error("extension given without a context")]
    MissingContext,
}
