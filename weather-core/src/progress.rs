/// Blocking "working on it" indicator shown while a request is in flight.
pub trait ProgressIndicator: Send {
    fn show(&mut self);
    fn dismiss(&mut self);
}

/// Shows the indicator on creation and dismisses it exactly once,
/// explicitly or when dropped.
pub struct ProgressGuard<'a> {
    indicator: &'a mut dyn ProgressIndicator,
    dismissed: bool,
}

impl<'a> ProgressGuard<'a> {
    pub fn show(indicator: &'a mut dyn ProgressIndicator) -> Self {
        indicator.show();
        Self { indicator, dismissed: false }
    }

    pub fn dismiss(mut self) {
        self.dismiss_once();
    }

    fn dismiss_once(&mut self) {
        if !self.dismissed {
            self.dismissed = true;
            self.indicator.dismiss();
        }
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.dismiss_once();
    }
}
