//! Instruction and prompt strings shown to the participant.
//!
//! Kept verbatim from the lab protocol. Localization is out of scope; the
//! strings live here so no component embeds copy inline.

pub const WELCOME: &str =
    "Welcome to the experiment! Please read the following instructions carefully.";

pub const TENS_INTRODUCTION: &str = "This experiment aims to investigate the effects of \
Transcutaneous Electrical Nerve Stimulation (TENS) on pain sensitivity. Different frequencies \
of TENS may be able to increase pain sensitivity by amplifying the pain signals that travel up \
your arm and into your brain.\n\nThe TENS itself is not painful, but you will feel a small \
sensation when it is turned on. Today we are testing the effects of monopolar and bipolar \
frequencies.";

pub const CALIBRATION: &str = "Firstly, we are going to calibrate the pain intensity for the \
shocks you will receive in the experiment without TENS. As this is a study about pain, we want \
you to feel a moderate bit of pain, but nothing unbearable. The machine will start low, and \
then will gradually work up. We want to get to a level which is painful but tolerable, so \
roughly at a rating of around 7 out of 10, where 1 is not painful and 10 is very painful.\n\n\
After each shock you will be asked if that level was ok, and you will be given the option to \
either try the next level or set the current shock level for the experiment. You can always \
come back down if it becomes too uncomfortable!\n\nPlease ask the experimenter if you have any \
questions at anytime.";

pub const CALIBRATION_FINISH: &str =
    "Thank you for completing the calibration, your maximum shock intensity has now been set.";

pub const EXPERIMENT: &str = "We can now begin the experiment. \n\nYou will now receive a \
series of electrical shocks and your task is to rate the intensity of the pain caused by each \
shock on a rating scale. This rating scale ranges from NOT PAINFUL to VERY PAINFUL. \n\nAll \
shocks will be signaled by a 10 second countdown. The shock will occur when an X appears, \
similarly as in the calibration procedure. On TENS trials, you will be given the choice \
between receiving monopolar or bipolar frequencies of TENS. Please use your mouse to select \
your choice. As you are waiting for the shock during the countdown, you will also be asked to \
rate how painful you expect the following shock to be. After each trial there will be a brief \
interval to allow you to rest between shocks. The task should take roughly 20 minutes. \n\n\
Please ask the experimenter if you have any questions now before proceeding.";

pub const CONTINUE: &str = "Press spacebar to continue";

pub const END: &str =
    "This concludes the experiment. Please ask the experimenter to help remove the devices.";

pub const TERMINATION: &str =
    "The experiment has been terminated. Please ask the experimenter to help remove the devices.";

// Response prompts.

pub const PAIN_PROMPT: &str = "How painful was the shock?";

pub const EXPECTANCY_PROMPT: &str = "How painful do you expect the next shock to be?";

pub const SHOCK_READY: &str = "Press spacebar to activate the shock";

pub const SHOCK_CHECK: &str = "Would you like to try the previous level of shock again?";

pub const CHECK: &str = "Please indicate whether you would like to try the next level of \
shock, stay at this level, or go back to the previous level for the experiment.";

pub const CHECK_LVL1: &str =
    "Please indicate whether you would like to try the next level of shock or stay at this level";

pub const CHECK_MAX: &str = "Note that this is the maximum level of shock.\n\nWould you like \
to stay at this level or go down a level?";

pub const CHOICE: &str = "Please choose which frequency of TENS you want to receive on this trial.";

// Button labels.

pub const NEXT_LEVEL: &str = "Try the next shock level";
pub const STAY_LEVEL: &str = "Stay at this shock level";
pub const PREVIOUS_LEVEL: &str = "Set the previous shock level";
pub const YES: &str = "Yes";
pub const NO: &str = "No";
